//! Error types for the enrichment cascade.

use thiserror::Error;

/// Main error type for cascade operations.
///
/// Mirrors the five-category taxonomy of the system: input validation is the
/// only category that is ever surfaced to a caller as a non-2xx response;
/// everything else is recoverable and stays local to a single transaction's
/// `reasoning_trace`.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Unparseable record or missing mandatory field.
    #[error("invalid input: {0}")]
    Input(String),

    /// External provider call failed, timed out, or returned an unusable
    /// payload. Recorded per record; never aborts the batch.
    #[error("provider error: {0}")]
    Provider(String),

    /// A sub-workflow node failed; the node records the failure in its trace
    /// and returns a skip rather than propagating.
    #[error("sub-workflow error: {0}")]
    SubWorkflow(String),

    /// Catalog write or persistence callback failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Invalid configuration, detected only at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// A streaming channel closed while a producer or consumer still held it.
    #[error("channel closed unexpectedly")]
    ChannelClosed,

    /// Fatal, non-recoverable failure outside the above categories.
    #[error("fatal error: {0}")]
    Fatal(String),
}

impl ResolveError {
    /// Creates an input error.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Creates a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Creates a sub-workflow error.
    pub fn sub_workflow(msg: impl Into<String>) -> Self {
        Self::SubWorkflow(msg.into())
    }

    /// Creates a persistence error.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a fatal error.
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Whether this error is recoverable: everything except `Input`,
    /// `Config`, and `Fatal` is meant to be absorbed locally rather than
    /// surfaced to the caller.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Provider(_) | Self::SubWorkflow(_) | Self::Persistence(_) | Self::ChannelClosed
        )
    }

    /// Whether this error should terminate the enclosing process/request
    /// rather than degrade a single record.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_) | Self::Config(_))
    }
}

/// Result type alias used throughout the cascade.
pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_errors_are_recoverable() {
        let err = ResolveError::provider("timeout calling merchant enrichment");
        assert!(err.is_recoverable());
        assert!(!err.is_fatal());
    }

    #[test]
    fn config_errors_are_fatal_and_unrecoverable() {
        let err = ResolveError::config("missing ENRICH_API_KEY");
        assert!(err.is_fatal());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn input_errors_are_neither_recoverable_nor_fatal() {
        let err = ResolveError::input("missing amount and description");
        assert!(!err.is_recoverable());
        assert!(!err.is_fatal());
    }
}
