//! Error types for the tunnel connectivity and dispatch layer.

use cadet_crypto::CryptoError;
use thiserror::Error;

/// Errors surfaced by tunnel operations.
///
/// None of these are fatal to the process: every caller-facing error is a
/// local condition the tunnel absorbs (drop a frame, raise a counter) rather
/// than a reason to tear the tunnel down.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// A ratchet or frame-codec operation failed; see [`CryptoError`] for
    /// the specific cause (MAC mismatch, gap exceeded, truncated frame).
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// `send` was attempted on a tunnel whose encryption state has no
    /// installed ratchet yet (still `UNINITIALIZED`/`SENT` in the KX
    /// handshake).
    #[error("tunnel has no established key state yet")]
    NoKeyState,

    /// `ConnectionSet::pick_ready` found nothing ready; the caller should
    /// rely on the `SendQueue` to redeliver once a connection becomes ready
    /// rather than treat this as terminal.
    #[error("no ready connection available")]
    NoReadyConnection,

    /// An inbound frame named a channel number this tunnel has no slot for.
    #[error("channel {0} not found in this tunnel")]
    ChannelNotFound(u32),

    /// The tokenizer recognized a byte that isn't one of the inner message
    /// kinds this tunnel's dispatcher handles.
    #[error("unknown inner message type: {0:#04x}")]
    UnknownInnerMessageType(u8),

    /// A decrypted inner message was truncated relative to its declared
    /// length.
    #[error("inner message frame too short: expected at least {expected} bytes, got {actual}")]
    InnerFrameTooShort {
        /// Minimum bytes the inner message kind requires.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// `SendQueue::cancel` was called on an entry whose continuation has
    /// already fired. A programmer error on the caller's part.
    #[error("queue entry already dispatched")]
    QueueEntryAlreadyDispatched,

    /// `ChannelTable::add_local` scanned the entire local half of the
    /// 32-bit channel-number space without finding a free slot.
    #[error("no free channel numbers remain in this tunnel")]
    ChannelNumbersExhausted,

    /// `ChannelTable::record_remote` was asked to record a channel number
    /// already present, or one without the remote-allocated bit set.
    #[error("channel number {0} is not a valid remote-allocated slot")]
    InvalidRemoteChannelNumber(u32),
}

/// Result type for tunnel operations.
pub type Result<T> = std::result::Result<T, TunnelError>;
