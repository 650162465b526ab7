//! Downstream stream types: consumer classification, ids, health snapshot
//! and the envelope that the fan-out tier delivers.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::AppId;

/// Kind of downstream subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumerClass {
    /// Full, unfiltered stream
    Firehose,
    /// Stream filtered to one application
    App,
}

/// Registry-assigned consumer identifier
///
/// Allocated from a monotonically increasing counter and never reused, so a
/// stale id can never address a newer consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl ConsumerId {
    /// Wrap a raw id
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Point-in-time counters of the stream health registry
///
/// Serialized with the field names the health endpoint exposes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHealthSnapshot {
    /// Live firehose-class consumers
    #[serde(rename = "firehoseStreamCount")]
    pub firehose_count: usize,
    /// Live app-class consumers
    #[serde(rename = "appStreamCount")]
    pub app_count: usize,
    /// Live consumers flagged slow
    #[serde(rename = "slowConsumerCount")]
    pub slow_count: usize,
}

impl StreamHealthSnapshot {
    /// Total live consumers
    pub fn total(&self) -> usize {
        self.firehose_count + self.app_count
    }
}

/// One message travelling through the fan-out tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Owning application, if the producer tagged one
    pub app_id: Option<AppId>,
    /// Opaque encoded event
    pub payload: Bytes,
}

impl Envelope {
    /// Untagged envelope (delivered to firehose consumers only)
    pub fn untagged(payload: impl Into<Bytes>) -> Self {
        Self {
            app_id: None,
            payload: payload.into(),
        }
    }

    /// Envelope tagged with an application
    pub fn for_app(app_id: impl Into<AppId>, payload: impl Into<Bytes>) -> Self {
        Self {
            app_id: Some(app_id.into()),
            payload: payload.into(),
        }
    }
}
