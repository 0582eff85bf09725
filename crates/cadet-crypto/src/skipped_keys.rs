//! Bounded cache of message keys skipped over by out-of-order delivery.
//!
//! When a frame arrives whose `Ns` is ahead of the receiver's expected
//! counter, every message key between the expected counter and `Ns` is
//! derived and staged here instead of being discarded, so a late arrival
//! can still be decrypted. The store is a bounded FIFO: once
//! [`crate::MAX_SKIPPED_KEYS`] entries are held, the oldest is evicted (and
//! zeroized) to make room for the newest.

use alloc::collections::VecDeque;
use zeroize::Zeroize;

use crate::MAX_SKIPPED_KEYS;

/// A single skipped message key, indexed by the header key it was derived
/// under and the message number it would have decrypted.
pub struct SkippedKey {
    /// The header key (`HKr` at the epoch this key belongs to) used to
    /// locate it: a frame is only checked against skipped keys whose header
    /// key authenticates its encrypted header.
    pub header_key: [u8; 32],
    /// The message number (`Nr`) this key decrypts.
    pub message_number: u32,
    /// The message key itself.
    pub message_key: [u8; 32],
}

impl Drop for SkippedKey {
    fn drop(&mut self) {
        self.header_key.zeroize();
        self.message_key.zeroize();
    }
}

/// Bounded FIFO cache of [`SkippedKey`] entries.
#[derive(Default)]
pub struct SkippedKeyStore {
    entries: VecDeque<SkippedKey>,
}

impl SkippedKeyStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
        }
    }

    /// Number of keys currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no keys are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stage a key, evicting the oldest entry first if the store is full.
    pub fn insert(&mut self, header_key: [u8; 32], message_number: u32, message_key: [u8; 32]) {
        if self.entries.len() >= MAX_SKIPPED_KEYS {
            self.entries.pop_front();
        }
        self.entries.push_back(SkippedKey {
            header_key,
            message_number,
            message_key,
        });
    }

    /// Find a distinct header key among the held entries for which
    /// `matches` returns true, without consuming anything. Used to trial
    /// a frame's MAC against every header key a skipped entry was bound
    /// to, since the caller does not know in advance which one (if any)
    /// authenticates the frame.
    pub fn find_matching_header_key(&self, matches: impl Fn(&[u8; 32]) -> bool) -> Option<[u8; 32]> {
        self.entries
            .iter()
            .map(|entry| entry.header_key)
            .find(|hk| matches(hk))
    }

    /// Look up and remove (consume) a key matching `header_key` and
    /// `message_number`. Returns `None` if absent, in which case the
    /// caller falls through to the live ratchet chains.
    pub fn take(&mut self, header_key: &[u8; 32], message_number: u32) -> Option<[u8; 32]> {
        let index = self
            .entries
            .iter()
            .position(|entry| &entry.header_key == header_key && entry.message_number == message_number)?;
        let entry = self.entries.remove(index)?;
        Some(entry.message_key)
    }
}
