//! Wire framing for Axolotl-encrypted messages.
//!
//! ```text
//! offset 0  : mac                (16 B, truncated HMAC_HASH(HKs, header||payload))
//! offset 16 : header_ciphertext  (56 B, AEAD-sealed Ns || PNs || DHRs_pub)
//! offset 72 : payload_ciphertext (variable, AEAD-sealed application data)
//! ```
//!
//! The header's plaintext layout (before sealing) is `Ns` and `PNs` in
//! network byte order followed by the raw DH public key:
//! `Ns_nbo(4) || PNs_nbo(4) || DHRs_pub(32)`.

use alloc::vec::Vec;

use crate::error::CryptoError;

/// Truncated frame MAC width.
pub const MAC_SIZE: usize = 16;

/// Plaintext header width: `Ns(4) || PNs(4) || DHRs_pub(32)`.
pub const AX_HEADER_PLAINTEXT_SIZE: usize = 4 + 4 + 32;

/// AEAD tag width (`XChaCha20-Poly1305`).
const AEAD_TAG_SIZE: usize = 16;

/// Sealed header width: plaintext header plus its AEAD tag.
pub const AX_HEADER_SIZE: usize = AX_HEADER_PLAINTEXT_SIZE + AEAD_TAG_SIZE;

/// Minimum valid frame: MAC, sealed header, and an empty sealed payload
/// (which is still `AEAD_TAG_SIZE` bytes for the tag alone).
const MIN_FRAME_SIZE: usize = MAC_SIZE + AX_HEADER_SIZE + AEAD_TAG_SIZE;

/// The plaintext header fields, decrypted from a frame's sealed header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AxHeader {
    /// Sender's message number for this frame.
    pub ns: u32,
    /// Messages sent under the sender's previous sending chain.
    pub pns: u32,
    /// Sender's current ratchet public key.
    pub dhrs_pub: [u8; 32],
}

impl AxHeader {
    /// Serialize to the plaintext layout sealed into a frame's header.
    #[must_use]
    pub fn encode(&self) -> [u8; AX_HEADER_PLAINTEXT_SIZE] {
        let mut out = [0u8; AX_HEADER_PLAINTEXT_SIZE];
        out[0..4].copy_from_slice(&self.ns.to_be_bytes());
        out[4..8].copy_from_slice(&self.pns.to_be_bytes());
        out[8..40].copy_from_slice(&self.dhrs_pub);
        out
    }

    /// Parse the plaintext layout recovered from a sealed header.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::FrameTooShort`] if `bytes` is shorter than
    /// [`AX_HEADER_PLAINTEXT_SIZE`].
    pub fn decode(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < AX_HEADER_PLAINTEXT_SIZE {
            return Err(CryptoError::FrameTooShort {
                expected: AX_HEADER_PLAINTEXT_SIZE,
                actual: bytes.len(),
            });
        }
        let mut ns_bytes = [0u8; 4];
        ns_bytes.copy_from_slice(&bytes[0..4]);
        let mut pns_bytes = [0u8; 4];
        pns_bytes.copy_from_slice(&bytes[4..8]);
        let mut dhrs_pub = [0u8; 32];
        dhrs_pub.copy_from_slice(&bytes[8..40]);
        Ok(Self {
            ns: u32::from_be_bytes(ns_bytes),
            pns: u32::from_be_bytes(pns_bytes),
            dhrs_pub,
        })
    }
}

/// An Axolotl-sealed frame as it travels over a connection.
#[derive(Clone, Debug)]
pub struct AxFrame {
    /// Truncated MAC over `header_ciphertext || payload_ciphertext`, keyed
    /// by the sender's `HKs`, used to select a decryption key without
    /// fully decrypting the header first.
    pub mac: [u8; MAC_SIZE],
    /// `AX_HEADER_SIZE`-byte AEAD-sealed header.
    pub header_ciphertext: Vec<u8>,
    /// AEAD-sealed application payload.
    pub payload_ciphertext: Vec<u8>,
}

impl AxFrame {
    /// Serialize to wire bytes: `mac || header_ciphertext || payload_ciphertext`.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(MAC_SIZE + self.header_ciphertext.len() + self.payload_ciphertext.len());
        out.extend_from_slice(&self.mac);
        out.extend_from_slice(&self.header_ciphertext);
        out.extend_from_slice(&self.payload_ciphertext);
        out
    }

    /// Parse wire bytes into a frame, without attempting any decryption.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::FrameTooShort`] if `bytes` is smaller than the
    /// minimum valid frame (MAC, sealed header, empty sealed payload).
    pub fn decode(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < MIN_FRAME_SIZE {
            return Err(CryptoError::FrameTooShort {
                expected: MIN_FRAME_SIZE,
                actual: bytes.len(),
            });
        }
        let mut mac = [0u8; MAC_SIZE];
        mac.copy_from_slice(&bytes[0..MAC_SIZE]);
        let header_ciphertext = bytes[MAC_SIZE..MAC_SIZE + AX_HEADER_SIZE].to_vec();
        let payload_ciphertext = bytes[MAC_SIZE + AX_HEADER_SIZE..].to_vec();
        Ok(Self {
            mac,
            header_ciphertext,
            payload_ciphertext,
        })
    }

    /// The bytes the frame MAC is computed over: `header || payload`.
    #[must_use]
    pub fn mac_input(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.header_ciphertext.len() + self.payload_ciphertext.len());
        out.extend_from_slice(&self.header_ciphertext);
        out.extend_from_slice(&self.payload_ciphertext);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip() {
        let header = AxHeader {
            ns: 7,
            pns: 3,
            dhrs_pub: [9u8; 32],
        };
        let encoded = header.encode();
        assert_eq!(AxHeader::decode(&encoded).unwrap(), header);
    }

    #[test]
    fn header_decode_rejects_short_input() {
        assert!(AxHeader::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn header_encodes_big_endian() {
        let header = AxHeader {
            ns: 0x0102_0304,
            pns: 0,
            dhrs_pub: [0u8; 32],
        };
        let encoded = header.encode();
        assert_eq!(&encoded[0..4], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn frame_roundtrip() {
        let frame = AxFrame {
            mac: [1u8; MAC_SIZE],
            header_ciphertext: alloc::vec![2u8; AX_HEADER_SIZE],
            payload_ciphertext: alloc::vec![3u8; 48],
        };
        let encoded = frame.encode();
        let decoded = AxFrame::decode(&encoded).unwrap();
        assert_eq!(decoded.mac, frame.mac);
        assert_eq!(decoded.header_ciphertext, frame.header_ciphertext);
        assert_eq!(decoded.payload_ciphertext, frame.payload_ciphertext);
    }

    #[test]
    fn frame_decode_rejects_short_input() {
        assert!(AxFrame::decode(&[0u8; 10]).is_err());
    }
}
