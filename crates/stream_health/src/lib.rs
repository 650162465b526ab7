//! # Stream Health
//!
//! Downstream consumer tracking for the forwarding tier.
//!
//! - [`StreamHealthRegistry`]: live firehose/app consumer counts and slow flags
//! - [`ConsumerHandle`]: per-consumer bounded queue; overflow marks the consumer slow
//! - [`StreamFanout`]: publishes envelopes to firehose and per-app consumers
//! - [`serve_tap`]: TCP surface consumers subscribe through

pub mod consumer;
pub mod fanout;
pub mod registry;
pub mod tap;

pub use consumer::{ConsumerHandle, ConsumerMetrics, SendStatus};
pub use contracts::{ConsumerClass, ConsumerId, ConsumerSink, Envelope, StreamHealthSnapshot};
pub use fanout::{PublishReport, StreamFanout};
pub use registry::StreamHealthRegistry;
pub use tap::{Subscription, TcpConsumerSink, serve_tap};
