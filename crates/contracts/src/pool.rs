//! Destination handles and the ClientPool selection contract.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::ContractError;

/// Reference to one aggregation-node connection
///
/// Owned by a [`ClientPool`]; the engine borrows an `Arc` of it for the
/// duration of a single write and never retains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Destination {
    addr: SocketAddr,
}

impl Destination {
    /// Create a destination for the given node address
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Node address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl From<SocketAddr> for Destination {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.addr)
    }
}

/// Pool of reachable destinations
///
/// Membership is mutated by an external feed, concurrently with selection.
pub trait ClientPool: Send + Sync {
    /// Pick a destination uniformly at random from the current membership
    ///
    /// # Errors
    /// `ContractError::EmptyPool` when nothing is registered, including when
    /// the pool drained between the size check and the pick.
    fn random_client(&self) -> Result<Arc<Destination>, ContractError>;

    /// Current number of destinations; used verbatim as the engine weight
    fn size(&self) -> usize;
}

impl<P: ClientPool + ?Sized> ClientPool for Arc<P> {
    fn random_client(&self) -> Result<Arc<Destination>, ContractError> {
        (**self).random_client()
    }

    fn size(&self) -> usize {
        (**self).size()
    }
}
