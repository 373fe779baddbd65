use thiserror::Error;

pub type SplitflowResult<T> = Result<T, SplitflowError>;

/// Error taxonomy for the allocation engine. Every failure is deterministic
/// given the same store state; nothing here is retried internally.
#[derive(Error, Debug)]
pub enum SplitflowError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown campaign, variant, or user. Surfaced to the caller as-is.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A mutation was rejected because it would break a counter invariant.
    /// State is left untouched when this is returned.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Out-of-domain input such as a bad exploration rate or a malformed
    /// campaign definition.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}
