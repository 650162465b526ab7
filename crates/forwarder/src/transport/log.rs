//! LogTransportWriter - logs a write summary via tracing

use contracts::{ContractError, Destination, TransportWriter};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, instrument};

/// Writer that logs instead of sending (dry runs)
pub struct LogTransportWriter {
    name: String,
    writes: AtomicU64,
}

impl LogTransportWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            writes: AtomicU64::new(0),
        }
    }

    /// Writes logged so far
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl TransportWriter for LogTransportWriter {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_writer_write",
        skip(self, destination, payload),
        fields(writer = %self.name)
    )]
    async fn write(&self, destination: &Destination, payload: &[u8]) -> Result<(), ContractError> {
        let seq = self.writes.fetch_add(1, Ordering::Relaxed) + 1;
        info!(destination = %destination, bytes = payload.len(), seq, "message forwarded (dry run)");
        Ok(())
    }
}
