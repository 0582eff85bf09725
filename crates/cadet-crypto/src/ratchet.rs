//! The Axolotl-style double ratchet: a symmetric per-message ratchet in
//! each direction, wrapped in a Diffie-Hellman ratchet that steps forward
//! once per epoch.
//!
//! Two chain keys (`CKs`, `CKr`) advance on every message and are never
//! reused; two pairs of header keys (`HKs`/`NHKs`, `HKr`/`NHKr`) let a
//! receiver detect that the peer has stepped the DH ratchet without first
//! decrypting the message body. A bounded [`SkippedKeyStore`] absorbs
//! messages that arrive out of order relative to either chain.
//!
//! The key-exchange process that produces the very first root key and
//! header keys is intentionally not this module's concern: callers (the
//! owning tunnel) hand in already-negotiated initial material and this
//! type only ever steps forward from there.

use alloc::vec::Vec;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

use crate::aead;
use crate::error::CryptoError;
use crate::frame::{AxFrame, AxHeader};
use crate::hash::{hmac_hash, kdf};
use crate::random::SecureRng;
use crate::skipped_keys::SkippedKeyStore;
use crate::x25519::{DhKeyPair, DhPublicKey};
use crate::MAX_KEY_GAP;

/// Width of the truncated frame MAC.
const MAC_SIZE: usize = crate::frame::MAC_SIZE;

/// Tunable thresholds governing when a sending ratchet step is due.
#[derive(Clone, Copy, Debug)]
pub struct AxolotlConfig {
    /// Force a ratchet step once this many messages have been sent on the
    /// current sending chain, provided the peer has acknowledged it
    /// (`ratchet_allowed`).
    pub ratchet_messages: u32,
    /// Force a ratchet step once `now` reaches the deadline set after the
    /// last step, in whatever time unit the caller's `now` uses.
    pub ratchet_time: u64,
}

impl Default for AxolotlConfig {
    fn default() -> Self {
        Self {
            ratchet_messages: 1000,
            ratchet_time: 3600,
        }
    }
}

/// What a successful decrypt tells the caller about the ratchet's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecryptOutcome {
    /// Decrypted on the current receiving chain; no DH step occurred.
    InOrder,
    /// Decrypting this frame required adopting the peer's new DH ratchet
    /// key (a receive-side step): the caller should treat the connection
    /// as confirmed and may clear any local retransmission of a pending
    /// send-side step.
    Ratcheted,
}

/// The full Axolotl ratchet state for one tunnel, in one direction pair.
pub struct AxolotlState {
    rk: [u8; 32],
    cks: [u8; 32],
    ckr: [u8; 32],
    hks: [u8; 32],
    hkr: [u8; 32],
    nhks: [u8; 32],
    nhkr: [u8; 32],
    dhrs: DhKeyPair,
    dhrr: Option<DhPublicKey>,
    ns: u32,
    nr: u32,
    pns: u32,
    ratchet_flag: bool,
    ratchet_allowed: bool,
    ratchet_counter: u32,
    ratchet_expiration: u64,
    skipped: SkippedKeyStore,
    config: AxolotlConfig,
}

impl Drop for AxolotlState {
    fn drop(&mut self) {
        self.rk.zeroize();
        self.cks.zeroize();
        self.ckr.zeroize();
        self.hks.zeroize();
        self.hkr.zeroize();
        self.nhks.zeroize();
        self.nhkr.zeroize();
    }
}

/// A chain-key derivation step: `MK = derive(CK, "0")`, `CK' = derive(CK, "1")`.
fn derive_chain(ck: &[u8; 32], label: &[u8]) -> [u8; 32] {
    let ikm = hmac_hash(ck, label);
    kdf::<1>("axolotl derive key", ck, &ikm)[0]
}

/// Truncated HMAC used for frame-MAC / key-selection trials.
fn mac_short(key: &[u8; 32], data: &[u8]) -> [u8; MAC_SIZE] {
    let full = hmac_hash(key, data);
    let mut out = [0u8; MAC_SIZE];
    out.copy_from_slice(&full[..MAC_SIZE]);
    out
}

impl AxolotlState {
    /// Build a ratchet from already-negotiated initial key material.
    ///
    /// `rk` is the initial root key; `cks`/`ckr` the initial sending and
    /// receiving chain keys; `hks`/`hkr`/`nhks`/`nhkr` the initial header
    /// key set; `dhrs` this side's ratchet keypair; `dhrr` the peer's
    /// ratchet public key, if already known at construction time.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rk: [u8; 32],
        cks: [u8; 32],
        ckr: [u8; 32],
        hks: [u8; 32],
        hkr: [u8; 32],
        nhks: [u8; 32],
        nhkr: [u8; 32],
        dhrs: DhKeyPair,
        dhrr: Option<DhPublicKey>,
        config: AxolotlConfig,
        now: u64,
    ) -> Self {
        Self {
            rk,
            cks,
            ckr,
            hks,
            hkr,
            nhks,
            nhkr,
            dhrs,
            dhrr,
            ns: 0,
            nr: 0,
            pns: 0,
            ratchet_flag: false,
            ratchet_allowed: false,
            ratchet_counter: 0,
            ratchet_expiration: now.saturating_add(config.ratchet_time),
            skipped: SkippedKeyStore::new(),
            config,
        }
    }

    /// Current send counter, for diagnostics.
    #[must_use]
    pub fn ns(&self) -> u32 {
        self.ns
    }

    /// Current receive counter, for diagnostics.
    #[must_use]
    pub fn nr(&self) -> u32 {
        self.nr
    }

    /// Number of keys held in the out-of-order cache.
    #[must_use]
    pub fn skipped_key_count(&self) -> usize {
        self.skipped.len()
    }

    /// Encrypt `plaintext` into a wire-ready frame, stepping the sending
    /// chain (and, if due, the DH ratchet) in the process.
    ///
    /// `now` is a monotonic clock reading in the same unit as
    /// [`AxolotlConfig::ratchet_time`]; it is only consulted to decide
    /// whether a deadline-driven ratchet step is due.
    pub fn encrypt(&mut self, plaintext: &[u8], now: u64) -> AxFrame {
        self.ratchet_counter = self.ratchet_counter.saturating_add(1);
        if self.ratchet_allowed
            && (self.ratchet_counter >= self.config.ratchet_messages || now >= self.ratchet_expiration)
        {
            self.ratchet_flag = true;
        }

        if self.ratchet_flag {
            self.step_send_ratchet(now);
        }

        let mk = derive_chain(&self.cks, b"0");
        self.cks = derive_chain(&self.cks, b"1");

        let header = AxHeader {
            ns: self.ns,
            pns: self.pns,
            dhrs_pub: *self.dhrs.public().as_bytes(),
        };
        let header_plaintext = header.encode();
        let header_ciphertext = aead::seal(&self.hks, &header_plaintext, &[]);
        let payload_ciphertext = aead::seal(&mk, plaintext, &header_ciphertext);

        let mut mac_input = Vec::with_capacity(header_ciphertext.len() + payload_ciphertext.len());
        mac_input.extend_from_slice(&header_ciphertext);
        mac_input.extend_from_slice(&payload_ciphertext);
        let mac = mac_short(&self.hks, &mac_input);

        self.ns = self.ns.wrapping_add(1);

        AxFrame {
            mac,
            header_ciphertext,
            payload_ciphertext,
        }
    }

    /// Step the sending side's DH ratchet: roll `HKs` forward, derive a
    /// fresh sending chain from the current peer ratchet key, and reset
    /// the per-chain counters.
    fn step_send_ratchet(&mut self, now: u64) {
        let peer = self
            .dhrr
            .expect("a sending ratchet step requires a known peer ratchet key");
        let new_dhrs = DhKeyPair::generate(SecureRng::new());
        let dh = new_dhrs.diffie_hellman(&peer);

        let ikm = hmac_hash(&self.rk, &dh);
        let [rk2, nhks2, cks2] = kdf::<3>("axolotl ratchet", &self.rk, &ikm);

        self.rk = rk2;
        self.hks = self.nhks;
        self.nhks = nhks2;
        self.cks = cks2;
        self.dhrs = new_dhrs;
        self.pns = self.ns;
        self.ns = 0;
        self.ratchet_flag = false;
        self.ratchet_allowed = false;
        self.ratchet_counter = 0;
        self.ratchet_expiration = now.saturating_add(self.config.ratchet_time);
    }

    /// Decrypt a received frame, trying the current receiving chain, then
    /// the next-header key (a peer-initiated DH step), then the skipped-key
    /// cache, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::MacMismatch`] if no key authenticates the
    /// frame, or [`CryptoError::GapExceeded`] if accepting it would require
    /// staging more than [`crate::MAX_KEY_GAP`] skipped keys.
    pub fn decrypt(&mut self, frame: &AxFrame) -> Result<(Vec<u8>, DecryptOutcome), CryptoError> {
        let mac_input = frame.mac_input();

        if mac_short(&self.hkr, &mac_input).ct_eq(&frame.mac).into() {
            return self.decrypt_current_chain(frame, DecryptOutcome::InOrder);
        }

        if mac_short(&self.nhkr, &mac_input).ct_eq(&frame.mac).into() {
            return self.decrypt_with_ratchet_step(frame);
        }

        if let Some(header_key) = self
            .skipped
            .find_matching_header_key(|hk| mac_short(hk, &mac_input).ct_eq(&frame.mac).into())
        {
            let header_plaintext = aead::open(&header_key, &frame.header_ciphertext, &[])?;
            let header = AxHeader::decode(&header_plaintext)?;
            let mk = self
                .skipped
                .take(&header_key, header.ns)
                .ok_or(CryptoError::MacMismatch)?;
            let plaintext = aead::open(&mk, &frame.payload_ciphertext, &frame.header_ciphertext)?;
            return Ok((plaintext, DecryptOutcome::InOrder));
        }

        Err(CryptoError::MacMismatch)
    }

    /// Decrypt under the current receiving chain, staging any skipped keys
    /// for messages the peer sent ahead of the expected one.
    ///
    /// A frame authenticates under `HKr` for the whole epoch, not just the
    /// next-expected message, so this is reached for delayed messages too
    /// (`Ns < Nr`): those can no longer be decrypted by re-deriving `CKr`,
    /// which only ever advances, so they fall through to a skipped-key
    /// lookup instead, consuming whatever `store_skipped_keys` staged for
    /// them on the message that originally jumped ahead.
    fn decrypt_current_chain(
        &mut self,
        frame: &AxFrame,
        outcome: DecryptOutcome,
    ) -> Result<(Vec<u8>, DecryptOutcome), CryptoError> {
        let header_plaintext = aead::open(&self.hkr, &frame.header_ciphertext, &[])?;
        let header = AxHeader::decode(&header_plaintext)?;

        if header.ns < self.nr {
            let hkr = self.hkr;
            let mk = self.skipped.take(&hkr, header.ns).ok_or(CryptoError::MacMismatch)?;
            let plaintext = aead::open(&mk, &frame.payload_ciphertext, &frame.header_ciphertext)?;
            return Ok((plaintext, outcome));
        }

        if header.ns != self.nr {
            let hkr = self.hkr;
            self.store_skipped_keys(header.ns, hkr)?;
        }

        let mk = derive_chain(&self.ckr, b"0");
        self.ckr = derive_chain(&self.ckr, b"1");
        let plaintext = aead::open(&mk, &frame.payload_ciphertext, &frame.header_ciphertext)?;
        self.nr = header.ns.wrapping_add(1);
        Ok((plaintext, outcome))
    }

    /// Step B: the frame authenticates under `NHKr`, meaning the peer has
    /// stepped its DH ratchet. Stage any messages still in flight under the
    /// old chain, adopt the new header/chain/root keys, then decrypt as in
    /// step A on the fresh chain.
    fn decrypt_with_ratchet_step(&mut self, frame: &AxFrame) -> Result<(Vec<u8>, DecryptOutcome), CryptoError> {
        let header_plaintext = aead::open(&self.nhkr, &frame.header_ciphertext, &[])?;
        let header = AxHeader::decode(&header_plaintext)?;
        let peer_dhr = DhPublicKey::from_bytes(header.dhrs_pub);

        if header.pns > self.nr {
            let old_hkr = self.hkr;
            self.store_skipped_keys(header.pns, old_hkr)?;
        }

        self.hkr = self.nhkr;

        let dh = self.dhrs.diffie_hellman(&peer_dhr);
        let ikm = hmac_hash(&self.rk, &dh);
        let [rk2, nhkr2, ckr2] = kdf::<3>("axolotl ratchet", &self.rk, &ikm);
        self.rk = rk2;
        self.nhkr = nhkr2;
        self.ckr = ckr2;
        self.dhrr = Some(peer_dhr);
        self.nr = 0;
        self.ratchet_allowed = true;

        if header.ns != self.nr {
            let hkr = self.hkr;
            self.store_skipped_keys(header.ns, hkr)?;
        }

        let mk = derive_chain(&self.ckr, b"0");
        self.ckr = derive_chain(&self.ckr, b"1");
        let plaintext = aead::open(&mk, &frame.payload_ciphertext, &frame.header_ciphertext)?;
        self.nr = header.ns.wrapping_add(1);
        Ok((plaintext, DecryptOutcome::Ratcheted))
    }

    /// Derive and cache message keys for `[self.nr, target)` on the current
    /// receiving chain, binding each to `header_key` for later lookup.
    fn store_skipped_keys(&mut self, target: u32, header_key: [u8; 32]) -> Result<(), CryptoError> {
        if target < self.nr {
            return Err(CryptoError::GapExceeded {
                advertised: target,
                current: self.nr,
            });
        }
        let gap = target - self.nr;
        if gap > MAX_KEY_GAP {
            return Err(CryptoError::GapExceeded {
                advertised: target,
                current: self.nr,
            });
        }
        let mut k = self.nr;
        while k < target {
            let mk = derive_chain(&self.ckr, b"0");
            self.ckr = derive_chain(&self.ckr, b"1");
            self.skipped.insert(header_key, k, mk);
            k += 1;
        }
        self.nr = target;
        Ok(())
    }
}
