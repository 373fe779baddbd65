//! Closed-form Bayesian comparison of two Beta posteriors.
//!
//! For X ~ Beta(a, b) and Y ~ Beta(c, d) with integer shape counts,
//!
//!   P(X > Y) = 1 - sum_{j=0}^{c-1} exp( lnB(a+j, b+d) - ln(d+j)
//!                                       - lnB(1+j, d) - lnB(a, b) )
//!
//! evaluated in log space so large counter values never overflow. Results
//! extremely close to 0 or 1 carry ordinary f64 cancellation error; that
//! precision limit is documented here rather than corrected.

use splitflow_core::{SplitflowError, SplitflowResult};

/// Natural log of the Beta function: ln B(a, b) = lnG(a) + lnG(b) - lnG(a+b).
pub fn ln_beta(a: f64, b: f64) -> f64 {
    libm::lgamma(a) + libm::lgamma(b) - libm::lgamma(a + b)
}

fn positive(name: &str, value: u64) -> SplitflowResult<f64> {
    if value == 0 {
        return Err(SplitflowError::InvalidParameter(format!(
            "{name} must be a positive count, got 0"
        )));
    }
    Ok(value as f64)
}

/// P(X > Y) for X ~ Beta(a, b), Y ~ Beta(c, d).
///
/// All four parameters are positive counts; callers derive them from
/// conversion/impression counters. The series has exactly `c` terms, so cost
/// scales with the second variant's conversion count.
pub fn probability_greater(a: u64, b: u64, c: u64, d: u64) -> SplitflowResult<f64> {
    let af = positive("a", a)?;
    let bf = positive("b", b)?;
    positive("c", c)?;
    let df = positive("d", d)?;

    let ln_beta_ab = ln_beta(af, bf);
    let mut total = 0.0f64;
    for j in 0..c {
        let jf = j as f64;
        total +=
            (ln_beta(af + jf, bf + df) - (df + jf).ln() - ln_beta(1.0 + jf, df) - ln_beta_ab)
                .exp();
    }
    Ok(1.0 - total)
}

/// Expected conversion-rate loss from picking Y over X when X is actually
/// better, i.e. E[max(X - Y, 0)] for X ~ Beta(a, b), Y ~ Beta(c, d).
///
/// Reporting-only figure; allocation never consults it.
pub fn expected_loss(a: u64, b: u64, c: u64, d: u64) -> SplitflowResult<f64> {
    let af = positive("a", a)?;
    let bf = positive("b", b)?;
    let cf = positive("c", c)?;
    let df = positive("d", d)?;

    let x_term = (ln_beta(af + 1.0, bf) - ln_beta(af, bf)).exp()
        * probability_greater(a + 1, b, c, d)?;
    let y_term = (ln_beta(cf + 1.0, df) - ln_beta(cf, df)).exp()
        * probability_greater(a, b, c + 1, d)?;
    Ok(x_term - y_term)
}
