//! Shared domain types, configuration, and error taxonomy for Splitflow.

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::{SplitflowError, SplitflowResult};
