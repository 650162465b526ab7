//! Transport writer implementations
//!
//! Contains UdpTransportWriter, TcpTransportWriter and LogTransportWriter,
//! plus [`ConfiguredTransport`] which picks one from config.

mod log;
mod tcp;
mod udp;

pub use self::log::LogTransportWriter;
pub use self::tcp::TcpTransportWriter;
pub use self::udp::{MAX_DATAGRAM_SIZE, UdpTransportWriter};

use crate::ForwarderError;
use contracts::{ContractError, Destination, TransportKind, TransportWriter};
use tracing::info;

/// Writer selected by `forwarder.transport`
pub enum ConfiguredTransport {
    Udp(UdpTransportWriter),
    Tcp(TcpTransportWriter),
    Log(LogTransportWriter),
}

impl ConfiguredTransport {
    /// Create the writer for `kind`
    ///
    /// # Errors
    /// UDP socket bind failure
    pub async fn create(name: &str, kind: TransportKind) -> Result<Self, ForwarderError> {
        let transport = match kind {
            TransportKind::Udp => {
                let local = "0.0.0.0:0".parse().map_err(|e| {
                    ForwarderError::transport_creation(name, format!("bad bind address: {e}"))
                })?;
                let writer = UdpTransportWriter::bind(name, local)
                    .await
                    .map_err(|e| ForwarderError::transport_creation(name, e.to_string()))?;
                Self::Udp(writer)
            }
            TransportKind::Tcp => Self::Tcp(TcpTransportWriter::new(name)),
            TransportKind::Log => Self::Log(LogTransportWriter::new(name)),
        };

        info!(writer = %name, kind = ?kind, "transport created");
        Ok(transport)
    }
}

impl TransportWriter for ConfiguredTransport {
    fn name(&self) -> &str {
        match self {
            Self::Udp(w) => w.name(),
            Self::Tcp(w) => w.name(),
            Self::Log(w) => w.name(),
        }
    }

    async fn write(&self, destination: &Destination, payload: &[u8]) -> Result<(), ContractError> {
        match self {
            Self::Udp(w) => w.write(destination, payload).await,
            Self::Tcp(w) => w.write(destination, payload).await,
            Self::Log(w) => w.write(destination, payload).await,
        }
    }
}
