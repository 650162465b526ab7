//! Random-selection client pool
//!
//! Membership changes at runtime (nodes join and leave the aggregation
//! tier) while writes keep selecting from it concurrently.

use contracts::{ClientPool, ContractError, Destination};
use rand::Rng;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info};

/// Pool that picks a uniformly random member per selection
#[derive(Debug, Default)]
pub struct RandomClientPool {
    members: RwLock<Vec<Arc<Destination>>>,
}

impl RandomClientPool {
    /// Create an empty pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool seeded with the given addresses (duplicates collapse)
    pub fn from_addrs(addrs: impl IntoIterator<Item = SocketAddr>) -> Self {
        let pool = Self::new();
        pool.replace_all(addrs);
        pool
    }

    /// Add a member; returns false when it is already present
    pub fn add(&self, addr: SocketAddr) -> bool {
        let destination = Destination::new(addr);
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        if members.iter().any(|m| **m == destination) {
            return false;
        }
        members.push(Arc::new(destination));
        debug!(destination = %destination, size = members.len(), "pool member added");
        true
    }

    /// Remove a member; returns false when it was not present
    pub fn remove(&self, addr: SocketAddr) -> bool {
        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        let before = members.len();
        members.retain(|m| m.addr() != addr);
        let removed = members.len() != before;
        if removed {
            debug!(destination = %addr, size = members.len(), "pool member removed");
        }
        removed
    }

    /// Swap the whole membership in one step
    pub fn replace_all(&self, addrs: impl IntoIterator<Item = SocketAddr>) {
        let mut next: Vec<Arc<Destination>> = Vec::new();
        for addr in addrs {
            let destination = Destination::new(addr);
            if !next.iter().any(|m| **m == destination) {
                next.push(Arc::new(destination));
            }
        }

        let mut members = self.members.write().unwrap_or_else(PoisonError::into_inner);
        info!(previous = members.len(), current = next.len(), "pool membership replaced");
        *members = next;
    }

    /// Current members, in insertion order
    pub fn destinations(&self) -> Vec<Destination> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|m| **m)
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

impl ClientPool for RandomClientPool {
    fn random_client(&self) -> Result<Arc<Destination>, ContractError> {
        let members = self.members.read().unwrap_or_else(PoisonError::into_inner);
        if members.is_empty() {
            return Err(ContractError::EmptyPool);
        }
        let idx = rand::rng().random_range(0..members.len());
        Ok(Arc::clone(&members[idx]))
    }

    fn size(&self) -> usize {
        self.members.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
