//! Beta-binomial statistics for A/B comparison — posterior sampling plus
//! closed-form probability-of-superiority and expected loss.

pub mod closed_form;
pub mod sampling;

pub use closed_form::{expected_loss, ln_beta, probability_greater};
pub use sampling::{posterior_draw, sample_beta};
