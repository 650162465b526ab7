//! RetryPolicy trait - re-attempt strategy injected into the engine

use std::future::Future;
use std::pin::Pin;

use crate::ContractError;

/// One boxed delivery attempt handed to a [`RetryPolicy`]
///
/// Boxed so the engine's write future stays `Send` when spawned.
pub type AttemptFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ContractError>> + Send + 'a>>;

/// Decides whether and how often to re-attempt a failed write
///
/// The policy never inspects the payload contents; it owns only the attempt
/// budget and the delay between attempts.
pub trait RetryPolicy: Send + Sync {
    /// Re-run `attempt` until it succeeds or the budget runs out
    ///
    /// The initial (already failed) write is not part of the budget.
    ///
    /// # Arguments
    /// * `payload` - The message being retried (for logging only)
    /// * `attempt` - One more delivery attempt
    ///
    /// # Returns
    /// `Ok(())` once an attempt succeeds, otherwise
    /// `ContractError::RetryExhausted` wrapping the last failure
    fn retry<'a, F>(
        &'a self,
        payload: &'a [u8],
        attempt: F,
    ) -> impl Future<Output = Result<(), ContractError>> + Send + 'a
    where
        F: FnMut() -> AttemptFuture<'a> + Send + 'a;
}
