//! Forwarder error types

use thiserror::Error;

/// Forwarder construction errors
///
/// Runtime write failures never surface here; they end in a
/// [`contracts::ForwardOutcome`] instead.
#[derive(Debug, Error)]
pub enum ForwarderError {
    /// Transport creation error
    #[error("failed to create transport '{name}': {message}")]
    TransportCreation { name: String, message: String },

    /// Configuration error (from contract)
    #[error("forwarder config error: {0}")]
    Contract(#[from] contracts::ContractError),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForwarderError {
    /// Create a transport creation error
    pub fn transport_creation(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TransportCreation {
            name: name.into(),
            message: message.into(),
        }
    }
}
