//! UdpTransportWriter - one datagram per message

use contracts::{ContractError, Destination, TransportWriter};
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, instrument};

/// Largest UDP payload over IPv4
pub const MAX_DATAGRAM_SIZE: usize = 65507;

/// Writer that sends each payload as a single datagram
///
/// One unconnected socket serves every destination; the target is chosen
/// per write with `send_to`.
pub struct UdpTransportWriter {
    name: String,
    socket: UdpSocket,
    max_datagram_size: usize,
}

impl UdpTransportWriter {
    /// Bind a writer on an ephemeral local port
    #[instrument(name = "udp_writer_bind", skip(name))]
    pub async fn bind(name: impl Into<String>, local: SocketAddr) -> std::io::Result<Self> {
        let name = name.into();
        let socket = UdpSocket::bind(local).await?;
        debug!(writer = %name, local = %socket.local_addr()?, "UDP writer bound");

        Ok(Self {
            name,
            socket,
            max_datagram_size: MAX_DATAGRAM_SIZE,
        })
    }

    /// Lower the datagram limit (never above the protocol maximum)
    pub fn with_max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size.min(MAX_DATAGRAM_SIZE);
        self
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

impl TransportWriter for UdpTransportWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, destination: &Destination, payload: &[u8]) -> Result<(), ContractError> {
        if payload.len() > self.max_datagram_size {
            return Err(ContractError::write_failed(
                destination,
                format!(
                    "payload of {} bytes exceeds datagram limit of {}",
                    payload.len(),
                    self.max_datagram_size
                ),
            ));
        }

        let sent = self
            .socket
            .send_to(payload, destination.addr())
            .await
            .map_err(|e| ContractError::write_failed(destination, e.to_string()))?;

        if sent != payload.len() {
            return Err(ContractError::write_failed(
                destination,
                format!("short send: {sent} of {} bytes", payload.len()),
            ));
        }

        debug!(writer = %self.name, destination = %destination, bytes = sent, "datagram sent");
        Ok(())
    }
}
