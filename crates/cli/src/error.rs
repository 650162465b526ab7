//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Address override or config value that is not a socket address
    #[error("Invalid {field} address '{value}': {message}")]
    InvalidAddress {
        field: &'static str,
        value: String,
        message: String,
    },

    /// Agent component failed to start
    #[error("Failed to start {component}: {message}")]
    Startup {
        component: &'static str,
        message: String,
    },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn invalid_address(field: &'static str, value: impl Into<String>, message: impl ToString) -> Self {
        Self::InvalidAddress {
            field,
            value: value.into(),
            message: message.to_string(),
        }
    }

    pub fn startup(component: &'static str, message: impl ToString) -> Self {
        Self::Startup {
            component,
            message: message.to_string(),
        }
    }
}
