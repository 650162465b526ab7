//! # Contracts
//!
//! Frozen interface contracts shared by the forwarding tier.
//! All business crates depend on this crate only; reverse dependencies are prohibited.
//!
//! ## Seams
//! - [`TransportWriter`]: one attempt to send bytes to one destination
//! - [`ClientPool`]: random selection over live destinations, size as weight
//! - [`RetryPolicy`]: attempt budget and backoff for failed writes
//! - [`ConsumerSink`]: delivery end of one downstream subscription
//! - [`StreamHealthSnapshot`]: consumer counters read by the health endpoint

mod app_id;
mod blueprint;
mod consumer;
mod error;
mod outcome;
mod pool;
mod retry;
mod stream;
mod transport;

pub use app_id::AppId;
pub use blueprint::*;
pub use consumer::*;
pub use error::*;
pub use outcome::ForwardOutcome;
pub use pool::{ClientPool, Destination};
pub use retry::{AttemptFuture, RetryPolicy};
pub use stream::*;
pub use transport::*;
