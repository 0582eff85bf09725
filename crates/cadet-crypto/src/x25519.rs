//! Diffie-Hellman ratchet keypairs.
//!
//! Wraps `x25519-dalek` for the three DH keypairs the ratchet needs: the
//! initial ephemeral handshake key (`kx_0`), and the rolling send/receive
//! ratchet keys (`DHRs`/`DHRr`).

use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// A DH public key (32 bytes), as advertised in the encrypted frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DhPublicKey([u8; 32]);

impl DhPublicKey {
    /// Wrap raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw bytes, for embedding in a frame header.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A DH keypair. The private half is zeroized on drop by `StaticSecret` itself.
pub struct DhKeyPair {
    secret: StaticSecret,
    public: DhPublicKey,
}

impl DhKeyPair {
    /// Generate a new random keypair.
    pub fn generate<R: RngCore + CryptoRng>(rng: R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = DhPublicKey(PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    /// The public half.
    #[must_use]
    pub fn public(&self) -> DhPublicKey {
        self.public
    }

    /// Perform the X25519 Diffie-Hellman agreement.
    #[must_use]
    pub fn diffie_hellman(&self, peer: &DhPublicKey) -> [u8; 32] {
        let peer_public = PublicKey::from(peer.0);
        *self.secret.diffie_hellman(&peer_public).as_bytes()
    }
}

impl Drop for DhKeyPair {
    fn drop(&mut self) {
        // `StaticSecret` zeroizes its own bytes on drop; this clears the
        // plaintext public-key copy held alongside it for hygiene.
        self.public.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::OsRng;

    #[test]
    fn diffie_hellman_agrees() {
        let a = DhKeyPair::generate(OsRng);
        let b = DhKeyPair::generate(OsRng);

        let shared_a = a.diffie_hellman(&b.public());
        let shared_b = b.diffie_hellman(&a.public());

        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn distinct_keypairs_distinct_public_keys() {
        let a = DhKeyPair::generate(OsRng);
        let b = DhKeyPair::generate(OsRng);
        assert_ne!(a.public().as_bytes(), b.public().as_bytes());
    }
}
