//! Injectable statistics sink.
//!
//! The tunnel core has no production statistics exporter of its own
//! but it does generate counters that a real deployment wants: failed decrypts, protocol
//! warnings, connection churn, ratchet advances. Rather than hard-code an
//! exporter, callers implement [`TunnelStats`] and hand an instance to
//! [`crate::tunnel::Tunnel::create`]; [`NullStats`] is the default when
//! nobody cares.

/// One method per counter a `Tunnel` raises in the course of normal
/// operation. All methods have a no-op default so an implementor only
/// overrides the counters it actually exports.
pub trait TunnelStats: Send + Sync {
    /// A frame failed to authenticate under any key (current, next, or
    /// skipped).
    fn unable_to_decrypt(&self) {}

    /// A frame, KX message, or inner message violated an expectation that
    /// isn't outright a MAC failure (e.g. an unknown inner message type).
    fn protocol_warning(&self) {}

    /// A connection was adopted into the `ConnectionSet`, whether via
    /// `consider_path` or `accept_inbound`.
    fn connection_adopted(&self) {}

    /// A connection was evicted by `maintenance_tick`.
    fn connection_evicted(&self) {}

    /// A DH ratchet step completed, in either direction.
    fn ratchet_advanced(&self) {}
}

/// A [`TunnelStats`] that discards everything. The default for a `Tunnel`
/// that hasn't been wired up to a real exporter.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStats;

impl TunnelStats for NullStats {}
