//! Error types for invariant checking and reporting.

use thiserror::Error;

/// Errors that can occur while checking invariants or building a report.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Batch was empty or otherwise too small to check meaningfully.
    #[error("Insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Serialization error while building a report.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Result type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;
