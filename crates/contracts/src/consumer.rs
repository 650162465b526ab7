//! ConsumerSink trait - delivery end of one downstream subscription

use crate::{ContractError, Envelope};

/// Outbound side of a single consumer connection
///
/// Owned by exactly one worker task, hence `&mut self`.
#[trait_variant::make(ConsumerSink: Send)]
pub trait LocalConsumerSink {
    /// Sink name (used for logging)
    fn name(&self) -> &str;

    /// Deliver one envelope
    ///
    /// # Errors
    /// Any error means the consumer is gone; the worker stops delivering.
    async fn deliver(&mut self, envelope: &Envelope) -> Result<(), ContractError>;

    /// Release the underlying connection
    async fn close(&mut self) -> Result<(), ContractError>;
}
