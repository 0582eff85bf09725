//! Axolotl-style double ratchet cryptography for the CADET tunnel core.
//!
//! This crate implements the forward-secret, authenticated, ordered channel
//! cryptography described for the CADET tunnel: a combined symmetric ratchet
//! (per message) wrapped in a Diffie-Hellman ratchet (per epoch), with
//! tolerance for out-of-order delivery via a bounded skipped-key cache.
//!
//! It is deliberately free of any async runtime or I/O: callers hand it
//! plaintext/ciphertext bytes and it hands back the other, plus the state
//! transitions the caller needs to drive connectivity and dispatch.
#![no_std]

extern crate alloc;

pub mod aead;
pub mod error;
pub mod frame;
pub mod hash;
pub mod random;
pub mod ratchet;
pub mod skipped_keys;
pub mod x25519;

pub use error::CryptoError;
pub use frame::{AxFrame, AX_HEADER_SIZE};
pub use ratchet::{AxolotlConfig, AxolotlState, DecryptOutcome};
pub use skipped_keys::{SkippedKey, SkippedKeyStore};
pub use x25519::{DhKeyPair, DhPublicKey};

/// Cap on the `SkippedKeyStore`.
pub const MAX_SKIPPED_KEYS: usize = 64;

/// Forward-gap reject threshold: a receive counter jump larger than this
/// many messages is treated as an attack or corruption rather than
/// reordering, and the frame is dropped.
pub const MAX_KEY_GAP: u32 = 256;
