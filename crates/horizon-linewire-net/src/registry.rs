//! Directory of accepted peers on the server, plus the unicast selection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use mio::Token;
use parking_lot::Mutex;

use crate::error::{NetworkError, Result};

/// Registry view of one accepted connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeerEntry {
    /// I/O loop token of the connection.
    pub token: Token,
    /// When the connection was accepted.
    pub established_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<SocketAddr, PeerEntry>,
    /// Addresses in accept order.
    order: Vec<SocketAddr>,
    selected: Option<SocketAddr>,
}

/// Thread-safe peer directory shared by the server's control thread and its
/// I/O loop.
///
/// Membership mirrors exactly the accepted sockets the I/O loop holds open.
/// The selection is never a departed peer: it is `None` while the registry is
/// empty, the first peer to arrive is selected automatically, and removing the
/// selected peer advances to the earliest-accepted remaining one.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    inner: Mutex<Inner>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an accepted peer.
    pub fn add(&self, addr: SocketAddr, token: Token) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&addr) {
            return Err(NetworkError::DuplicatePeer(addr));
        }
        inner.entries.insert(
            addr,
            PeerEntry {
                token,
                established_at: Instant::now(),
            },
        );
        inner.order.push(addr);
        if inner.selected.is_none() {
            inner.selected = Some(addr);
        }
        Ok(())
    }

    /// Unregister a peer. No-op if absent.
    pub fn remove(&self, addr: SocketAddr) -> Option<PeerEntry> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.remove(&addr)?;
        inner.order.retain(|a| *a != addr);
        if inner.selected == Some(addr) {
            inner.selected = inner.order.first().copied();
        }
        Some(entry)
    }

    /// Make `addr` the unicast addressee.
    pub fn select(&self, addr: SocketAddr) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.entries.contains_key(&addr) {
            return Err(NetworkError::UnknownPeer(addr));
        }
        inner.selected = Some(addr);
        Ok(())
    }

    /// The current unicast addressee, if any.
    pub fn selected(&self) -> Option<SocketAddr> {
        self.inner.lock().selected
    }

    /// Look up a peer.
    pub fn get(&self, addr: SocketAddr) -> Option<PeerEntry> {
        self.inner.lock().entries.get(&addr).copied()
    }

    /// Whether `addr` is registered.
    pub fn contains(&self, addr: SocketAddr) -> bool {
        self.inner.lock().entries.contains_key(&addr)
    }

    /// Registered peers in accept order.
    pub fn peers(&self) -> Vec<SocketAddr> {
        self.inner.lock().order.clone()
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether no peers are registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Remove every peer and the selection in one step.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.selected = None;
    }
}
