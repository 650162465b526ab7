//! TransportWriter trait - leaf interface between the engine and the network
//!
//! A writer makes exactly one attempt to hand a payload to one destination.
//! It owns no retry, buffering or selection logic.

use crate::{ContractError, Destination};

/// Single-attempt payload writer
///
/// Any failure (unreachable, refused, oversized) is surfaced as one opaque
/// error; the writer does not classify error kinds for its caller.
#[trait_variant::make(TransportWriter: Send)]
pub trait LocalTransportWriter {
    /// Writer name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Send `payload` to `destination`
    ///
    /// # Errors
    /// Returns `ContractError::WriteFailed` (or `Io`) describing the failure
    async fn write(&self, destination: &Destination, payload: &[u8]) -> Result<(), ContractError>;
}
