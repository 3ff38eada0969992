//! Core error types for stallwatch.
//!
//! Consumers report failures with [`ConsumerError`]. The dispatcher wraps
//! those in [`DetectionError`] so the instrumented call site can tell whether
//! the failure interrupted entry into the blocking operation or happened after
//! it returned.

use std::error::Error as StdError;
use thiserror::Error;

/// Error raised by a consumer.
///
/// Returning this from an entry consumer is how a policy forbids a blocking
/// call: the guarded operation never starts waiting.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConsumerError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl ConsumerError {
    /// Create a new consumer error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create a consumer error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync + 'static>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors surfaced to the caller of a guarded operation.
#[derive(Debug, Error)]
pub enum DetectionError {
    /// An entry consumer rejected the blocking call before it started waiting.
    #[error("Entry consumer rejected blocking call at {operation}: {source}")]
    EntryRejected {
        /// The operation string handed to the consumer.
        operation: String,
        /// The consumer's error.
        #[source]
        source: ConsumerError,
    },

    /// An exit consumer failed after the blocking call returned.
    #[error("Exit consumer failed after blocking call at {operation}: {source}")]
    ExitFailed {
        /// The operation string of the completed call.
        operation: String,
        /// The consumer's error.
        #[source]
        source: ConsumerError,
    },
}

impl DetectionError {
    /// The operation that was being guarded.
    pub fn operation(&self) -> &str {
        match self {
            DetectionError::EntryRejected { operation, .. }
            | DetectionError::ExitFailed { operation, .. } => operation,
        }
    }

    /// The consumer error that caused this failure.
    pub fn consumer_error(&self) -> &ConsumerError {
        match self {
            DetectionError::EntryRejected { source, .. }
            | DetectionError::ExitFailed { source, .. } => source,
        }
    }

    /// Whether the failure happened on entry, before the operation waited.
    pub fn is_entry(&self) -> bool {
        matches!(self, DetectionError::EntryRejected { .. })
    }
}

/// Errors while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading a configuration file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for this schema.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration is well-formed but semantically invalid.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type returned by consumers.
pub type ConsumerResult = std::result::Result<(), ConsumerError>;

/// Result type alias for dispatch operations.
pub type DetectionResult<T> = std::result::Result<T, DetectionError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consumer_error_source() {
        let io = std::io::Error::other("disk on fire");
        let err = ConsumerError::with_source("consumer failed", io);

        assert_eq!(err.message(), "consumer failed");
        assert_eq!(err.source().unwrap().to_string(), "disk on fire");
    }

    #[test]
    fn test_detection_error_accessors() {
        let err = DetectionError::EntryRejected {
            operation: "X.join".to_string(),
            source: ConsumerError::new("blocking forbidden"),
        };

        assert!(err.is_entry());
        assert_eq!(err.operation(), "X.join");
        assert_eq!(err.consumer_error().message(), "blocking forbidden");
        assert_eq!(
            err.to_string(),
            "Entry consumer rejected blocking call at X.join: blocking forbidden"
        );
    }
}
