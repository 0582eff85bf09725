//! Error types for the Axolotl ratchet and frame codec.

use thiserror::Error;

/// Errors produced by ratchet key derivation, AEAD operations, and frame
/// decoding.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// No key (current `HKr`, `NHKr`, or any skipped key) authenticated the
    /// frame.
    #[error("no key authenticated the frame")]
    MacMismatch,

    /// The peer advertised a message number that would require chaining more
    /// than `MAX_KEY_GAP` HMACs to reach, or one already behind the current
    /// receive counter on the active chain.
    #[error("advertised message number {advertised} exceeds current {current} by more than the allowed gap")]
    GapExceeded {
        /// The message number the peer advertised.
        advertised: u32,
        /// `Nr` at the time of the check.
        current: u32,
    },

    /// The frame was smaller than the fixed header plus one byte of payload.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum valid frame size.
        expected: usize,
        /// Actual size received.
        actual: usize,
    },

    /// A key was supplied with the wrong length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// The OS CSPRNG failed.
    #[error("random number generation failed")]
    RandomFailure,
}
