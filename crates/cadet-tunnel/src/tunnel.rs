//! `Tunnel` — the top-level orchestrator tying the ratchet, connection
//! pool, send queue, and channel table together.
//!
//! A `Tunnel` is keyed by a destination identity, and its mutable
//! crypto/channel state lives behind one lock. Nothing here arbitrates
//! genuinely concurrent writers — the tunnel's own operations are
//! totally ordered by its caller's scheduler — but a single lock keeps
//! the state maps consistent with each other without needing per-field
//! locks.

use std::sync::Arc;
use std::time::Instant;

use cadet_crypto::AxolotlState;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::channel_table::{ChannelRole, ChannelTable};
use crate::config::TunnelConfig;
use crate::connection::{Connection, ConnectionId, PathCandidate, PathId};
use crate::connection_set::ConnectionSet;
use crate::dispatch::{self, InnerMessage};
use crate::error::{Result, TunnelError};
use crate::send_queue::{Continuation, QueueHandle, SendQueue};
use crate::stats::TunnelStats;

/// How well the tunnel is attached to its destination, independent of
/// whether encryption is usable yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    /// Just created; path discovery not yet requested.
    New,
    /// Path discovery requested; no connection adopted yet.
    Searching,
    /// At least one connection adopted, but encryption isn't `OK` yet.
    Waiting,
    /// At least one connection adopted and encryption is `OK`.
    Ready,
    /// Torn down; no further operations are serviced.
    Shutdown,
}

/// Encryption state machine: `Uninitialized → Sent → Ping → Ok ↔ Rekey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionState {
    /// No KX exchanged yet; `send` cannot encrypt.
    Uninitialized,
    /// This side has sent its KX message and is waiting on the peer's.
    Sent,
    /// Both KX messages have crossed; the ratchet is installed but no
    /// payload has been exchanged yet.
    Ping,
    /// At least one payload has been successfully exchanged.
    Ok,
    /// A rekey is in flight; returns to `Ok` once acknowledged.
    Rekey,
}

/// What a caller's out-of-band KX exchange reports back to the tunnel.
/// This crate exposes a hook at the KX boundary without specifying KX
/// framing — that belongs to whatever handshake protocol the caller
/// runs.
pub enum KxEvent {
    /// This side's KX message was handed to the connection layer.
    Sent,
    /// The KX exchange completed and produced ratchet material; installs
    /// the ratchet and raises encryption state to `Ok`.
    Established(AxolotlState),
}

/// Where a `Tunnel` sends decoded post-decrypt messages. Opaque to the
/// tunnel beyond this one method.
pub trait ChannelHandle: Send + Sync {
    /// Deliver one inner message routed to this channel.
    fn deliver(&self, message: InnerMessage);
}

/// Supplies candidate paths toward a destination; the tunnel's
/// `create` asks this once to seed its `ConnectionSet`, offering each
/// known path to `consider_path` in turn.
pub trait PathSource: Send + Sync {
    /// Enumerate currently known paths toward `destination`, in
    /// increasing length order.
    fn discover(&self, destination: &[u8; 32]) -> Vec<Box<dyn PathCandidate>>;
}

/// Builds a channel handle for a channel the remote side opened via a
/// `channel-open` message.
pub trait ChannelFactory: Send + Sync {
    /// Construct the handle a newly remote-opened channel should deliver
    /// into.
    fn build(&self, channel_number: u32) -> Arc<dyn ChannelHandle>;
}

struct Inner {
    connectivity: ConnectivityState,
    encryption: EncryptionState,
    ratchet: Option<AxolotlState>,
    channels: ChannelTable<Arc<dyn ChannelHandle>>,
    idle_deadline: Option<Instant>,
}

/// A long-lived encrypted tunnel to one destination peer, multiplexing
/// application channels over a pool of redundant connections.
pub struct Tunnel {
    destination: [u8; 32],
    config: TunnelConfig,
    stats: Arc<dyn TunnelStats>,
    connections: ConnectionSet,
    send_queue: SendQueue,
    channel_factory: Arc<dyn ChannelFactory>,
    inner: Mutex<Inner>,
}

impl Tunnel {
    /// Create a tunnel to `destination`, seed its `ConnectionSet` from
    /// `path_source`, and leave encryption `UNINITIALIZED` until
    /// `handle_kx` installs a ratchet.
    ///
    /// `role` fixes which half of the channel-number space this side
    /// allocates from; both ends of a tunnel must agree on who played
    /// `Initiator` out of band, as that decision belongs to whatever
    /// drives the KX exchange.
    pub async fn create(
        destination: [u8; 32],
        role: ChannelRole,
        config: TunnelConfig,
        stats: Arc<dyn TunnelStats>,
        channel_factory: Arc<dyn ChannelFactory>,
        path_source: &dyn PathSource,
    ) -> Arc<Self> {
        let connections = ConnectionSet::new(config.desired_connections_per_tunnel);
        let tunnel = Arc::new(Self {
            destination,
            config,
            stats,
            connections,
            send_queue: SendQueue::new(),
            channel_factory,
            inner: Mutex::new(Inner {
                connectivity: ConnectivityState::New,
                encryption: EncryptionState::Uninitialized,
                ratchet: None,
                channels: ChannelTable::new(role),
                idle_deadline: Some(Instant::now() + config.idle_destroy_delay),
            }),
        });

        info!(destination = ?destination, "tunnel created, starting path discovery");
        tunnel.seed_connections(path_source).await;

        tunnel
    }

    /// Offer every path `path_source` currently knows about to
    /// `ConnectionSet::consider_path`, in the order given. Callable
    /// again later (e.g. on a periodic discovery tick) to adopt newly
    /// discovered paths, not just at construction time.
    pub async fn seed_connections(&self, path_source: &dyn PathSource) {
        {
            let mut inner = self.inner.lock().await;
            if inner.connectivity == ConnectivityState::New {
                inner.connectivity = ConnectivityState::Searching;
            }
        }

        for path in path_source.discover(&self.destination) {
            if let Some(id) = self.connections.consider_path(path, 0).await {
                debug!(?id, "adopted connection from path discovery");
                self.stats.connection_adopted();
            }
        }
        self.recompute_connectivity().await;
    }

    /// Destination peer identity this tunnel carries traffic to.
    #[must_use]
    pub fn destination(&self) -> [u8; 32] {
        self.destination
    }

    /// Open a locally-initiated channel, wiring its delivery to `handle`.
    /// Disarms the idle-destroy timer.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::ChannelNumbersExhausted`] if this side's
    /// half of the channel-number space is full.
    pub async fn add_channel(&self, handle: Arc<dyn ChannelHandle>) -> Result<u32> {
        let mut inner = self.inner.lock().await;
        let number = inner.channels.add_local(|_| handle)?;
        inner.idle_deadline = None;
        Ok(number)
    }

    /// Close a channel-slot. Arms the idle-destroy timer if the table
    /// becomes empty.
    pub async fn remove_channel(&self, channel_number: u32) {
        let mut inner = self.inner.lock().await;
        inner.channels.remove(channel_number);
        if inner.channels.is_empty() {
            inner.idle_deadline = Some(Instant::now() + self.config.idle_destroy_delay);
        }
    }

    /// Whether the idle-destroy deadline has passed. The caller's timer
    /// loop polls this and tears the tunnel down when it returns `true`.
    pub async fn idle_destroy_due(&self) -> bool {
        let inner = self.inner.lock().await;
        matches!(inner.idle_deadline, Some(deadline) if Instant::now() >= deadline)
    }

    /// Encrypt `message` through the ratchet and enqueue it, dispatching
    /// immediately if a connection is ready.
    ///
    /// # Errors
    ///
    /// Returns [`TunnelError::NoKeyState`] if no ratchet is installed yet
    /// (encryption state is still `UNINITIALIZED`/`SENT`).
    pub async fn send(&self, message: InnerMessage, cont: Continuation) -> Result<QueueHandle> {
        let frame_bytes = {
            let mut inner = self.inner.lock().await;
            let ratchet = inner.ratchet.as_mut().ok_or(TunnelError::NoKeyState)?;
            let now = monotonic_now();
            let frame = ratchet.encrypt(&message.encode(), now);
            frame.encode()
        };

        let handle = self.send_queue.send(frame_bytes, cont, &self.connections).await;
        Ok(handle)
    }

    /// Cancel a previously-queued send, if it hasn't dispatched yet.
    ///
    /// # Errors
    ///
    /// See [`SendQueue::cancel`].
    pub async fn cancel(&self, handle: QueueHandle) -> Result<()> {
        self.send_queue.cancel(handle).await
    }

    /// Handle an inbound encrypted frame from `connection`: decrypt,
    /// raise encryption state to `Ok` on success, tokenize the plaintext,
    /// and route it to the named channel.
    ///
    /// Runs to completion: this call does not yield partway through
    /// decrypt-then-dispatch.
    pub async fn handle_encrypted(&self, connection: ConnectionId, frame: &[u8]) -> Result<()> {
        let ax_frame = cadet_crypto::AxFrame::decode(frame)?;

        let plaintext = {
            let mut inner = self.inner.lock().await;
            let ratchet = inner.ratchet.as_mut().ok_or(TunnelError::NoKeyState)?;
            match ratchet.decrypt(&ax_frame) {
                Ok((plaintext, outcome)) => {
                    if matches!(outcome, cadet_crypto::DecryptOutcome::Ratcheted) {
                        self.stats.ratchet_advanced();
                    }
                    plaintext
                }
                Err(error) => {
                    self.stats.unable_to_decrypt();
                    if !matches!(inner.encryption, EncryptionState::Uninitialized | EncryptionState::Sent) {
                        warn!(?connection, ?error, "frame failed to authenticate under any ratchet key");
                    } else {
                        debug!(?connection, ?error, "frame failed to authenticate during handshake window");
                    }
                    return Err(TunnelError::from(error));
                }
            }
        };

        self.raise_encryption_state(EncryptionState::Ok).await;

        let message = match dispatch::decode(&plaintext) {
            Ok(message) => message,
            Err(error) => {
                self.stats.protocol_warning();
                warn!(?connection, ?error, "rejecting undecodable inner message");
                return Err(error);
            }
        };

        self.dispatch_to_channel(message).await
    }

    async fn dispatch_to_channel(&self, message: InnerMessage) -> Result<()> {
        if matches!(message, InnerMessage::Keepalive) {
            return Ok(());
        }

        let channel_number = message.channel_number();

        if let InnerMessage::ChannelOpen { .. } = message {
            let mut inner = self.inner.lock().await;
            let handle = self.channel_factory.build(channel_number);
            inner.channels.record_remote(channel_number, handle.clone())?;
            inner.idle_deadline = None;
            handle.deliver(message);
            return Ok(());
        }

        let mut inner = self.inner.lock().await;
        let handle = inner
            .channels
            .get(channel_number)
            .cloned()
            .ok_or(TunnelError::ChannelNotFound(channel_number))?;

        if let InnerMessage::ChannelDestroy { .. } = message {
            inner.channels.remove(channel_number);
            if inner.channels.is_empty() {
                inner.idle_deadline = Some(Instant::now() + self.config.idle_destroy_delay);
            }
        }
        drop(inner);

        handle.deliver(message);
        Ok(())
    }

    /// Drive the encryption-state machine from the tunnel's KX boundary.
    /// KX framing itself is out of scope for this crate; the caller's KX
    /// driver calls this once it has something to report.
    pub async fn handle_kx(&self, event: KxEvent) {
        match event {
            KxEvent::Sent => {
                let mut inner = self.inner.lock().await;
                if inner.encryption == EncryptionState::Uninitialized {
                    inner.encryption = EncryptionState::Sent;
                }
            }
            KxEvent::Established(ratchet) => {
                {
                    let mut inner = self.inner.lock().await;
                    inner.ratchet = Some(ratchet);
                }
                self.raise_encryption_state(EncryptionState::Ping).await;
            }
        }
    }

    /// Rekey timer expiry: moves `Ok → Rekey`. A no-op, returning `false`,
    /// unless encryption is currently `Ok` — only one rekey may be in
    /// flight at a time. Cancelled implicitly once encryption returns to
    /// `Ok`, since a fresh timer is only armed from that transition.
    ///
    /// The rekey-initiating frame itself crosses the same KX boundary as
    /// the initial handshake; this method only flips the state flag the
    /// caller's KX driver checks before sending that frame.
    pub async fn begin_rekey(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.encryption != EncryptionState::Ok {
            return false;
        }
        inner.encryption = EncryptionState::Rekey;
        true
    }

    /// The peer has acknowledged the in-flight rekey (via whatever KX
    /// exchange `begin_rekey` triggered): returns to `Ok`. A no-op unless
    /// currently `Rekey`.
    pub async fn rekey_acknowledged(&self) {
        let mut inner = self.inner.lock().await;
        if inner.encryption == EncryptionState::Rekey {
            inner.encryption = EncryptionState::Ok;
        }
    }

    /// Encryption state only ever moves forward along
    /// `Uninitialized → Sent → Ping → Ok`, except `Rekey ↔ Ok`; this
    /// enforces that monotonicity centrally rather than at each call
    /// site.
    async fn raise_encryption_state(&self, candidate: EncryptionState) {
        let mut inner = self.inner.lock().await;
        let rank = |s: EncryptionState| match s {
            EncryptionState::Uninitialized => 0,
            EncryptionState::Sent => 1,
            EncryptionState::Ping => 2,
            EncryptionState::Ok | EncryptionState::Rekey => 3,
        };
        if rank(candidate) > rank(inner.encryption) {
            inner.encryption = candidate;
        }
        drop(inner);
        self.recompute_connectivity().await;
    }

    async fn recompute_connectivity(&self) {
        let has_connection = !self.connections.is_empty().await;
        let mut inner = self.inner.lock().await;
        if inner.connectivity == ConnectivityState::Shutdown {
            return;
        }
        inner.connectivity = match (has_connection, inner.encryption) {
            (false, _) => ConnectivityState::Searching,
            (true, EncryptionState::Ok | EncryptionState::Rekey) => ConnectivityState::Ready,
            (true, _) => ConnectivityState::Waiting,
        };
    }

    /// Current connectivity state, for diagnostics and tests.
    pub async fn connectivity_state(&self) -> ConnectivityState {
        self.inner.lock().await.connectivity
    }

    /// Current encryption state, for diagnostics and tests.
    pub async fn encryption_state(&self) -> EncryptionState {
        self.inner.lock().await.encryption
    }

    /// Periodic connection-maintenance tick. Scheduled periodically by
    /// the caller; a fixed interval is a reasonable default.
    pub async fn run_maintenance(&self) {
        if let Some(evicted) = self.connections.maintenance_tick().await {
            debug!(?evicted, "connection-maintenance evicted lowest-throughput connection");
            self.stats.connection_evicted();
        }
    }

    /// Drop the tunnel's back-reference to `connection` synchronously, as
    /// required when the connection layer signals termination.
    pub async fn handle_disconnected(&self, connection: ConnectionId) {
        self.connections.remove(connection).await;
        self.recompute_connectivity().await;
    }

    /// Accept an inbound connection the connection layer has already
    /// authorized.
    pub async fn handle_inbound_connection(&self, connection: Arc<dyn Connection>, path_id: PathId) {
        let id = self.connections.accept_inbound(connection, path_id).await;
        self.stats.connection_adopted();
        debug!(?id, "adopted inbound connection");
        self.recompute_connectivity().await;
        self.send_queue.on_connection_ready(&self.connections).await;
    }

    /// Side-effect-only introspection: emits the tunnel's current state
    /// at the requested tracing level.
    pub async fn debug(&self, level: tracing::Level) {
        let inner = self.inner.lock().await;
        let message = format!(
            "tunnel destination={:?} connectivity={:?} encryption={:?} channels={}",
            self.destination,
            inner.connectivity,
            inner.encryption,
            inner.channels.len(),
        );
        match level {
            tracing::Level::ERROR => tracing::error!("{message}"),
            tracing::Level::WARN => warn!("{message}"),
            tracing::Level::INFO => info!("{message}"),
            tracing::Level::DEBUG => debug!("{message}"),
            tracing::Level::TRACE => tracing::trace!("{message}"),
        }
    }
}

/// Monotonic clock reading in the unit `AxolotlConfig::ratchet_time` uses
/// (seconds since an arbitrary epoch fixed at process start).
fn monotonic_now() -> u64 {
    static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
    let start = *START.get_or_init(Instant::now);
    Instant::now().duration_since(start).as_secs()
}
