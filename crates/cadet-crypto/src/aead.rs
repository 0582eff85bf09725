//! AEAD primitives for header and payload encryption.
//!
//! Both the header (`Ns`/`PNs`/`DHRs_pub`) and the payload are encrypted
//! with `XChaCha20-Poly1305` under keys the ratchet derives. Unlike a
//! transport cipher that encrypts many messages under one key, every key
//! here (`MK`, `HKs`) is used for exactly one frame and then discarded, so
//! the nonce does not need to be random or counter-based: it is derived
//! deterministically from the key itself via a labeled hash.

use alloc::vec::Vec;
use chacha20poly1305::{
    XChaCha20Poly1305,
    aead::{Aead, KeyInit, Payload},
};

use crate::error::CryptoError;

/// `XChaCha20-Poly1305` nonce size (24 bytes).
pub const NONCE_SIZE: usize = 24;

/// Derive the one-time nonce for a single-use key.
fn derive_nonce(key: &[u8; 32]) -> [u8; NONCE_SIZE] {
    let digest = blake3::keyed_hash(key, b"axolotl frame iv");
    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest.as_bytes()[..NONCE_SIZE]);
    nonce
}

/// Encrypt `plaintext` under a single-use 32-byte key. Infallible: a
/// 32-byte `XChaCha20-Poly1305` key is always accepted.
pub fn seal(key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Vec<u8> {
    let nonce = derive_nonce(key);
    let cipher = XChaCha20Poly1305::new(key.into());
    cipher
        .encrypt(
            chacha20poly1305::XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .expect("XChaCha20-Poly1305 encryption with a valid key never fails")
}

/// Decrypt `ciphertext` (with appended tag) under a single-use 32-byte key.
///
/// # Errors
///
/// Returns [`CryptoError::MacMismatch`] if authentication fails.
pub fn open(key: &[u8; 32], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let nonce = derive_nonce(key);
    let cipher = XChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(
            chacha20poly1305::XNonce::from_slice(&nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| CryptoError::MacMismatch)
}
