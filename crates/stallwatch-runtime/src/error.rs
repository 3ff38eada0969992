//! Error types for the runtime.

use thiserror::Error;

/// Errors while attaching an instrumentation engine.
#[derive(Debug, Error)]
pub enum InstallError {
    /// The engine failed to install its hooks.
    #[error("Instrumentation '{engine}' failed to install: {message}")]
    Failed {
        /// Engine name.
        engine: String,
        /// Failure description.
        message: String,
    },

    /// The engine cannot run in this process.
    #[error("Instrumentation '{0}' is not supported here")]
    Unsupported(String),
}

/// Result type for installation.
pub type InstallResult<T> = std::result::Result<T, InstallError>;
