//! Layered error definitions
//!
//! Categorized by source: forwarding / config / io

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Forwarding Errors =====
    /// No destination registered in the client pool
    #[error("client pool is empty")]
    EmptyPool,

    /// Transport-level failure on a selected destination
    #[error("write to '{destination}' failed: {message}")]
    WriteFailed {
        destination: String,
        message: String,
    },

    /// Retry budget consumed without a successful attempt
    #[error("retry exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<ContractError>,
    },

    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create write failure error
    pub fn write_failed(destination: impl ToString, message: impl Into<String>) -> Self {
        Self::WriteFailed {
            destination: destination.to_string(),
            message: message.into(),
        }
    }

    /// Create retry exhaustion error wrapping the last attempt's failure
    pub fn retry_exhausted(attempts: u32, last: ContractError) -> Self {
        Self::RetryExhausted {
            attempts,
            last: Box::new(last),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True for errors that a retry policy may reasonably re-attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WriteFailed { .. } | Self::Io(_))
    }
}
