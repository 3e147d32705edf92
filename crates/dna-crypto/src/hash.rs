//! Hashing primitives: SHA-3-512 for fingerprints, SHA-256 for DHT keys.

use sha2::{Digest, Sha256};
use sha3::Sha3_512;

/// SHA-3-512, used for identity fingerprints (spec §3, §4.4).
pub fn sha3_512(bytes: &[u8]) -> [u8; 64] {
    let mut hasher = Sha3_512::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 64];
    out.copy_from_slice(&digest);
    out
}

/// SHA-256, used for deriving DHT keys from namespaced strings (spec §3).
pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::to_hex;

    #[test]
    fn sha256_is_deterministic_and_64_hex_chars() {
        let a = to_hex(&sha256(b"dna:feeds:topic:abc"));
        let b = to_hex(&sha256(b"dna:feeds:topic:abc"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }

    #[test]
    fn sha3_512_is_64_bytes() {
        assert_eq!(sha3_512(b"key-material").len(), 64);
    }
}
