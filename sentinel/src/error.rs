//! Error types for the sentinel core
//!
//! There is no fatal error class inside a scan cycle: individual signal
//! failures degrade to defaults and write failures become failed
//! outcomes. These errors surface at the shell — bad config, unusable
//! endpoints, and the degenerate conditions a caller must decide about.

use thiserror::Error;

/// Result type alias for sentinel operations
pub type Result<T> = std::result::Result<T, SentinelError>;

/// Error types for the sentinel layer
#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Chain I/O error: {0}")]
    ChainIo(#[from] vigil_chainio::ChainIoError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scan error: {message}")]
    Scan { message: String },

    #[error("Allocation error: {message}")]
    Allocation { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SentinelError {
    /// Create a scan error
    pub fn scan<S: Into<String>>(message: S) -> Self {
        Self::Scan {
            message: message.into(),
        }
    }

    /// Create an allocation error
    pub fn allocation<S: Into<String>>(message: S) -> Self {
        Self::Allocation {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error is retryable on the next cycle
    pub fn is_retryable(&self) -> bool {
        matches!(self, SentinelError::ChainIo(_) | SentinelError::Scan { .. })
    }
}
