//! `ConnectionSet` — the tunnel's pool of redundant underlying connections.
//!
//! `consider_path` applies its admission rules in a fixed order rather
//! than delegating to a pluggable selection strategy, and
//! `maintenance_tick` evicts by decayed throughput rather than reacting to
//! an externally driven migration call.
//!
//! All operations on one tunnel are totally ordered by its caller, so the
//! `RwLock` here exists only so a `ConnectionSet` can be shared behind an
//! `Arc` alongside the rest of the tunnel's state, not to arbitrate
//! genuinely concurrent writers.

use std::time::Instant;

use tokio::sync::RwLock;

use crate::connection::{path_already_known, Connection, ConnectionHandle, ConnectionId, PathCandidate, PathId};
use std::sync::Arc;

/// The tunnel's pool of underlying connections to its destination peer.
pub struct ConnectionSet {
    connections: RwLock<Vec<ConnectionHandle>>,
    desired_connections: usize,
}

impl ConnectionSet {
    /// An empty set targeting `desired_connections` as its steady-state
    /// size.
    #[must_use]
    pub fn new(desired_connections: usize) -> Self {
        Self {
            connections: RwLock::new(Vec::new()),
            desired_connections: desired_connections.max(1),
        }
    }

    /// Current number of adopted connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// True if no connections are adopted.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Consider adopting `path` as a new connection, applying the
    /// admission rules in order:
    ///
    /// 1. Reject if an existing connection already uses this path.
    /// 2. Reject if already over `desired_connections` and this path is
    ///    more than twice as long (after the destination offset) as the
    ///    current shortest.
    /// 3. Reject if at or over `desired_connections` and this path is no
    ///    shorter than the current shortest.
    /// 4. Otherwise adopt.
    ///
    /// `destination_offset` accounts for paths discovered while relaying
    /// for a third party, where the destination sits mid-path: the
    /// effective length compared against existing connections is
    /// `hop_count - destination_offset`.
    ///
    /// Returns the adopted connection's id, or `None` if rejected.
    pub async fn consider_path(&self, path: Box<dyn PathCandidate>, destination_offset: usize) -> Option<ConnectionId> {
        let effective_len = path.hop_count().saturating_sub(destination_offset);
        let path_id = path.identity();

        let mut connections = self.connections.write().await;

        if path_already_known(&connections, path_id) {
            return None;
        }

        if let Some(shortest) = Self::shortest_effective_len(&connections) {
            let count = connections.len();
            if count > self.desired_connections && effective_len > 2 * shortest {
                return None;
            }
            if count >= self.desired_connections && effective_len >= shortest {
                return None;
            }
        }

        let connection = path.open();
        let id = connection.id();
        connections.push(ConnectionHandle::new(connection, path_id, Some(effective_len), Instant::now()));
        Some(id)
    }

    /// Shortest effective length among connections that were themselves
    /// adopted via a length comparison (`consider_path`); connections
    /// adopted via `accept_inbound` carry no known length and don't
    /// participate in the comparison.
    fn shortest_effective_len(connections: &[ConnectionHandle]) -> Option<usize> {
        connections.iter().filter_map(ConnectionHandle::effective_len).min()
    }

    /// Always adopt `connection` under `path_id`; the caller (the
    /// connection layer, via an inbound notification) has already
    /// authorized it.
    pub async fn accept_inbound(&self, connection: Arc<dyn Connection>, path_id: PathId) -> ConnectionId {
        let id = connection.id();
        let mut connections = self.connections.write().await;
        connections.push(ConnectionHandle::new(connection, path_id, None, Instant::now()));
        id
    }

    /// The first connection, in insertion (oldest-first) order, whose
    /// readiness predicate holds.
    pub async fn pick_ready(&self) -> Option<ConnectionId> {
        let connections = self.connections.read().await;
        connections.iter().find(|c| c.is_ready()).map(ConnectionHandle::id)
    }

    /// Hand `frame` to the connection identified by `pick_ready`'s
    /// result, if it's still present.
    pub async fn send_via(&self, id: ConnectionId, frame: &[u8]) -> crate::error::Result<()> {
        let connections = self.connections.read().await;
        match connections.iter().find(|c| c.id() == id) {
            Some(handle) => handle.send(frame),
            None => Err(crate::error::TunnelError::NoReadyConnection),
        }
    }

    /// Record a throughput sample against a connection, for eviction
    /// scoring.
    pub async fn record_throughput(&self, id: ConnectionId, sample: f64) {
        let connections = self.connections.read().await;
        if let Some(handle) = connections.iter().find(|c| c.id() == id) {
            handle.record_throughput(sample);
        }
    }

    /// Drop the back-reference to `id` immediately; called synchronously
    /// from the connection layer's disconnect callback, so a connection
    /// can never be selected again once it has reported itself gone.
    pub async fn remove(&self, id: ConnectionId) {
        let mut connections = self.connections.write().await;
        connections.retain(|c| c.id() != id);
    }

    /// Evict the lowest-throughput connection if the set exceeds
    /// `desired_connections + 1`, to make room for fresh path
    /// exploration. Never evicts the last connection. Returns the
    /// evicted id, if any.
    pub async fn maintenance_tick(&self) -> Option<ConnectionId> {
        let mut connections = self.connections.write().await;
        if connections.len() <= self.desired_connections + 1 || connections.len() <= 1 {
            return None;
        }

        let worst_index = connections
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.throughput().partial_cmp(&b.throughput()).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(index, _)| index)?;

        let evicted = connections.remove(worst_index);
        Some(evicted.id())
    }
}
