//! Tunnel connectivity manager, send queue, and dispatch for the CADET
//! tunnel core.
//!
//! This crate owns everything above the ratchet:
//! a pool of redundant underlying connections ([`connection_set`]), a
//! FIFO of outbound frames waiting on one to be ready ([`send_queue`]),
//! the multiplexing of application channels over a single encrypted
//! stream ([`channel_table`], [`dispatch`]), and the orchestrator that
//! ties all of it to one [`cadet_crypto::AxolotlState`] per destination
//! ([`tunnel`]). Unlike `cadet-crypto`, this crate owns the async
//! runtime: every shared collection here is built on `tokio::sync`
//! primitives.

pub mod channel_table;
pub mod config;
pub mod connection;
pub mod connection_set;
pub mod dispatch;
pub mod error;
pub mod send_queue;
pub mod stats;
pub mod tunnel;

pub use channel_table::{ChannelRole, ChannelTable};
pub use config::TunnelConfig;
pub use connection::{Connection, ConnectionHandle, ConnectionId, PathCandidate, PathId};
pub use connection_set::ConnectionSet;
pub use dispatch::InnerMessage;
pub use error::{Result, TunnelError};
pub use send_queue::{Continuation, QueueHandle, SendQueue};
pub use stats::{NullStats, TunnelStats};
pub use tunnel::{ChannelFactory, ChannelHandle, ConnectivityState, EncryptionState, KxEvent, Tunnel};
