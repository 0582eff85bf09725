//! Keyed-hash and HKDF-style expansion primitives underlying the ratchet.
//!
//! `HMAC_HASH` is BLAKE3's keyed mode. `KDF` is a labeled
//! HKDF-style expander built on the same primitive: a context string picks
//! the domain, and the output is split into as many fixed-width subkeys as
//! the caller needs.

/// Keyed hash: `HMAC_HASH(key, data) -> 32-byte digest`.
#[must_use]
pub fn hmac_hash(key: &[u8; 32], data: &[u8]) -> [u8; 32] {
    *blake3::keyed_hash(key, data).as_bytes()
}

/// Labeled KDF producing `N` concatenated 32-byte subkeys from `salt` and
/// `ikm`. `context` provides domain separation between call sites (e.g.
/// `"axolotl derive key"` vs `"axolotl ratchet"`).
///
/// Implemented as HKDF-extract-then-expand over BLAKE3: the salt keys a
/// BLAKE3 hash of `context || ikm` to produce a pseudorandom key, which is
/// then used to key successive BLAKE3 hashes of an incrementing counter to
/// fill the requested output.
pub fn kdf<const N: usize>(context: &str, salt: &[u8; 32], ikm: &[u8; 32]) -> [[u8; 32]; N] {
    // Extract: fold context and ikm into a PRK keyed by salt.
    let mut extract = blake3::Hasher::new_keyed(salt);
    extract.update(context.as_bytes());
    extract.update(ikm);
    let prk = *extract.finalize().as_bytes();

    // Expand: derive N subkeys by hashing an incrementing counter under the PRK.
    let mut out = [[0u8; 32]; N];
    let mut counter: u8 = 1;
    for slot in &mut out {
        let mut expand = blake3::Hasher::new_keyed(&prk);
        expand.update(context.as_bytes());
        expand.update(&[counter]);
        *slot = *expand.finalize().as_bytes();
        counter += 1;
    }
    out
}
