//! TcpTransportWriter - length-prefixed frames over cached connections
//!
//! Frame layout: `u32` big-endian payload length, then the payload.

use contracts::{ContractError, Destination, TransportWriter};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, warn};

type Connection = Arc<Mutex<TcpStream>>;

struct CachedConnection {
    stream: Connection,
    last_used: Instant,
}

/// Writer keeping one connection per destination
///
/// A connection that fails a write is evicted; the next write to that
/// destination dials again. Dialing happens outside the cache lock, so a
/// stuck destination only delays writes to itself. Connections unused for
/// `idle_timeout` are closed on the next write, which is how members
/// removed from the pool lose their socket.
pub struct TcpTransportWriter {
    name: String,
    connect_timeout: Duration,
    idle_timeout: Duration,
    connections: Mutex<HashMap<SocketAddr, CachedConnection>>,
}

impl TcpTransportWriter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connect_timeout: Duration::from_secs(1),
            idle_timeout: Duration::from_secs(60),
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Number of cached connections
    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Close every cached connection idle for longer than `idle_timeout`
    pub async fn evict_idle(&self) -> usize {
        let mut connections = self.connections.lock().await;
        self.sweep(&mut connections, None)
    }

    fn sweep(&self, connections: &mut HashMap<SocketAddr, CachedConnection>, keep: Option<SocketAddr>) -> usize {
        let before = connections.len();
        connections.retain(|addr, cached| {
            Some(*addr) == keep || cached.last_used.elapsed() < self.idle_timeout
        });
        let evicted = before - connections.len();
        if evicted > 0 {
            debug!(writer = %self.name, evicted, "idle TCP connections closed");
        }
        evicted
    }

    async fn cached(&self, addr: SocketAddr) -> Option<Connection> {
        let mut connections = self.connections.lock().await;
        self.sweep(&mut connections, Some(addr));
        connections.get_mut(&addr).map(|cached| {
            cached.last_used = Instant::now();
            Arc::clone(&cached.stream)
        })
    }

    async fn connection(&self, addr: SocketAddr) -> std::io::Result<Connection> {
        if let Some(conn) = self.cached(addr).await {
            return Ok(conn);
        }

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;

        // Another write may have dialed the same destination meanwhile.
        let mut connections = self.connections.lock().await;
        let cached = connections.entry(addr).or_insert_with(|| {
            debug!(writer = %self.name, destination = %addr, "TCP connection established");
            CachedConnection {
                stream: Arc::new(Mutex::new(stream)),
                last_used: Instant::now(),
            }
        });
        cached.last_used = Instant::now();
        Ok(Arc::clone(&cached.stream))
    }

    /// Drop `conn` from the cache unless it was already replaced
    async fn evict(&self, addr: SocketAddr, conn: &Connection) {
        let mut connections = self.connections.lock().await;
        if connections
            .get(&addr)
            .is_some_and(|cached| Arc::ptr_eq(&cached.stream, conn))
        {
            connections.remove(&addr);
            warn!(writer = %self.name, destination = %addr, "TCP connection evicted");
        }
    }
}

async fn write_frame(stream: &mut TcpStream, payload: &[u8]) -> std::io::Result<()> {
    let len = u32::try_from(payload.len()).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "payload exceeds frame limit")
    })?;
    stream.write_u32(len).await?;
    stream.write_all(payload).await?;
    stream.flush().await
}

impl TransportWriter for TcpTransportWriter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&self, destination: &Destination, payload: &[u8]) -> Result<(), ContractError> {
        let addr = destination.addr();
        let conn = self
            .connection(addr)
            .await
            .map_err(|e| ContractError::write_failed(destination, e.to_string()))?;

        let result = {
            let mut stream = conn.lock().await;
            write_frame(&mut stream, payload).await
        };

        match result {
            Ok(()) => {
                debug!(writer = %self.name, destination = %destination, bytes = payload.len(), "frame sent");
                Ok(())
            }
            Err(e) => {
                self.evict(addr, &conn).await;
                Err(ContractError::write_failed(destination, e.to_string()))
            }
        }
    }
}
