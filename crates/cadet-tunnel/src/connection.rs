//! The connection layer as seen from inside a tunnel: an external
//! collaborator the tunnel holds a non-owning reference to.
//!
//! Path setup, per-hop forwarding, and ACKs all belong to the connection
//! layer (out of scope for this crate). What the tunnel needs from a
//! connection is narrow: an identity to dedup against, a readiness
//! predicate, and a way to hand it an encrypted frame. Modeled as a trait
//! object, `Arc<dyn Connection>`, since the tunnel never owns one outright.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::error::Result;

/// Opaque identifier for one connection, stable for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// One underlying routed path the connection layer maintains on the
/// tunnel's behalf.
///
/// The tunnel never owns a `Connection`'s lifetime: the connection layer
/// does, and the tunnel's reference is a back-pointer that must be dropped
/// synchronously when `disconnected` fires (see [`crate::connection_set::ConnectionSet`]).
pub trait Connection: Send + Sync + std::fmt::Debug {
    /// Stable identity for this connection.
    fn id(&self) -> ConnectionId;

    /// Whether the connection layer currently considers this connection
    /// able to carry a frame. Consulted by `ConnectionSet::pick_ready`.
    fn is_ready(&self) -> bool;

    /// Hand an already-encrypted frame to the connection layer for
    /// transmission. Fire-and-forget from the tunnel's perspective: the
    /// connection layer owns retransmission and ACK handling.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection layer rejects the frame (e.g.
    /// the connection has since been torn down).
    fn send(&self, frame: &[u8]) -> Result<()>;
}

/// A candidate path offered by the path-discovery layer, not yet adopted
/// as a connection.
///
/// `destination_offset` in [`crate::connection_set::ConnectionSet::consider_path`]
/// accounts for paths discovered while relaying for a third party, where
/// the tunnel's destination sits mid-path rather than at the end; this
/// trait reports only the raw hop count, and the offset is applied by the
/// caller.
pub trait PathCandidate: Send + Sync {
    /// Identity used to detect "an existing connection already uses this
    /// path" (rule 1 of `consider_path`). Two candidates over the same
    /// physical path must report the same identity.
    fn identity(&self) -> PathId;

    /// Number of hops in the path, destination-offset not yet applied.
    fn hop_count(&self) -> usize;

    /// Instantiate a connection over this path. Called only once adoption
    /// has already been decided.
    fn open(self: Box<Self>) -> Arc<dyn Connection>;
}

/// Identity of a path, for dedup against already-adopted connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathId(pub u64);

/// EWMA decay constant for [`ConnectionHandle::record_throughput`]
/// (`new = ALPHA * old + (1 - ALPHA) * sample`). Matches the constant the
/// original source's connection-eviction heuristic uses.
const THROUGHPUT_EWMA_ALPHA: f64 = 0.875;

/// A connection plus the bookkeeping the tunnel keeps about it: when it
/// was adopted, the path it was adopted from (for dedup), and an
/// exponentially-decayed estimate of its throughput (for eviction).
pub struct ConnectionHandle {
    connection: Arc<dyn Connection>,
    path_id: PathId,
    created_at: Instant,
    /// Effective hop length (`hop_count - destination_offset`) this
    /// connection was adopted from, if it came from a path comparison at
    /// all (`consider_path`). `None` for connections adopted via
    /// `accept_inbound`, which skip length comparison entirely.
    effective_len: Option<usize>,
    /// Throughput EWMA, stored as `f64` bits in an `AtomicU64` so
    /// `record_throughput` doesn't need `&mut self` through the
    /// `ConnectionSet`'s shared lock.
    throughput_bits: AtomicU64,
}

impl ConnectionHandle {
    pub(crate) fn new(connection: Arc<dyn Connection>, path_id: PathId, effective_len: Option<usize>, now: Instant) -> Self {
        Self {
            connection,
            path_id,
            created_at: now,
            effective_len,
            throughput_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// The effective hop length this connection was adopted from, if
    /// known (see [`Self::effective_len`] field docs).
    #[must_use]
    pub fn effective_len(&self) -> Option<usize> {
        self.effective_len
    }

    /// Stable identity of the underlying connection.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// The path this connection was adopted from, for dedup in
    /// `consider_path`.
    #[must_use]
    pub fn path_id(&self) -> PathId {
        self.path_id
    }

    /// When this connection was adopted into the tunnel's set.
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Whether the connection layer reports this connection ready to
    /// carry a frame right now.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.connection.is_ready()
    }

    /// Hand a frame to the underlying connection.
    ///
    /// # Errors
    ///
    /// Propagates [`TunnelError`] from the underlying `Connection::send`.
    pub fn send(&self, frame: &[u8]) -> Result<()> {
        self.connection.send(frame)
    }

    /// Current decayed throughput estimate, in whatever unit `sample`
    /// used (typically bytes/sec).
    #[must_use]
    pub fn throughput(&self) -> f64 {
        f64::from_bits(self.throughput_bits.load(Ordering::Relaxed))
    }

    /// Fold a new throughput sample into the decayed estimate:
    /// `new = 0.875 * old + 0.125 * sample`. Applying decay rather than a
    /// cumulative sum keeps an early burst from pinning a connection as
    /// "best" forever.
    pub fn record_throughput(&self, sample: f64) {
        // Relaxed compare-exchange loop: concurrent samples may race, but
        // losing one update to a race is harmless for an estimate this
        // coarse, and avoids a lock for a counter updated on every frame.
        let mut current = self.throughput_bits.load(Ordering::Relaxed);
        loop {
            let decayed = THROUGHPUT_EWMA_ALPHA * f64::from_bits(current) + (1.0 - THROUGHPUT_EWMA_ALPHA) * sample;
            match self.throughput_bits.compare_exchange_weak(
                current,
                decayed.to_bits(),
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(observed) => current = observed,
            }
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id())
            .field("path_id", &self.path_id)
            .field("throughput", &self.throughput())
            .finish()
    }
}

/// True if `existing` already holds a connection adopted from `path_id`
/// (rule 1 of `ConnectionSet::consider_path`).
pub fn path_already_known(existing: &[ConnectionHandle], path_id: PathId) -> bool {
    existing.iter().any(|c| c.path_id == path_id)
}
