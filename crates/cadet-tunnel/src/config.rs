//! Tunable parameters the tunnel core consumes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration surface for one `Tunnel`.
///
/// This struct does no parsing of its own; an embedding binary's config
/// file layer (out of scope for this crate) populates it via `serde` the
/// same way the rest of this codebase's config structs are deserialized
/// by their owning binary.
///
/// `MAX_SKIPPED_KEYS` and `MAX_KEY_GAP` are not fields here: they bound
/// `cadet_crypto`'s `SkippedKeyStore` and gap check directly as
/// compile-time constants
/// (`cadet_crypto::MAX_SKIPPED_KEYS`, `cadet_crypto::MAX_KEY_GAP`), since
/// nothing at this layer can safely change them without also changing the
/// wire-compatible gap/eviction behavior peers rely on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunnelConfig {
    /// How long the `ChannelTable` must stay empty before the tunnel is
    /// torn down. Armed when the table becomes empty, disarmed by
    /// `add_channel`.
    pub idle_destroy_delay: Duration,

    /// Target size of the `ConnectionSet`; `consider_path` and
    /// `maintenance_tick` both reference this.
    pub desired_connections_per_tunnel: usize,

    /// Interval between `ConnectionSet::maintenance_tick` calls. An
    /// implementation choice, not a protocol rule peers need to agree on.
    pub connection_maintenance_interval: Duration,

    /// Force a sending-side DH ratchet step once this many messages have
    /// gone out on the current chain (subject to `ratchet_allowed`).
    pub ratchet_messages: u32,

    /// Force a sending-side DH ratchet step once this much time has
    /// passed since the last one (subject to `ratchet_allowed`).
    pub ratchet_time: Duration,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            idle_destroy_delay: Duration::from_secs(90),
            desired_connections_per_tunnel: 3,
            connection_maintenance_interval: Duration::from_secs(30),
            ratchet_messages: 1000,
            ratchet_time: Duration::from_secs(3600),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = TunnelConfig::default();
        assert_eq!(config.idle_destroy_delay, Duration::from_secs(90));
        assert_eq!(config.desired_connections_per_tunnel, 3);
        assert_eq!(config.ratchet_messages, 1000);
        assert_eq!(config.ratchet_time, Duration::from_secs(3600));
    }

    #[test]
    fn custom_values_are_independent_of_defaults() {
        let config = TunnelConfig {
            desired_connections_per_tunnel: 5,
            ..TunnelConfig::default()
        };
        assert_eq!(config.desired_connections_per_tunnel, 5);
        assert_eq!(config.ratchet_messages, TunnelConfig::default().ratchet_messages);
    }
}
