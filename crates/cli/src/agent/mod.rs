//! Agent orchestration module.

mod ingest;
mod orchestrator;
mod stats;

pub use orchestrator::{Agent, AgentConfig, DEFAULT_MAX_IN_FLIGHT_WRITES};
pub use stats::AgentStats;
