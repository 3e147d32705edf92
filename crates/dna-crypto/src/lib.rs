//! Crypto adapter (C1): a thin, constant-time-where-possible contract around
//! the post-quantum primitives, hashing, AEAD, and encoding helpers the rest
//! of the data layer treats as opaque.
//!
//! Nothing above this crate is allowed to reach for `pqcrypto_*`,
//! `sha3`, or `aes_gcm` directly — every record codec goes through here so
//! that signature-vs-decode failures stay distinguishable (spec §4.1, §7).

pub mod aead;
pub mod encoding;
pub mod hash;
pub mod pq;
pub mod time;

use thiserror::Error;

/// Errors surfaced by the crypto adapter. Kept distinct from the higher
/// layers' `DnaError` so callers can tell "bytes didn't parse as a key" from
/// "signature didn't verify" from "AEAD tag mismatch".
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key encoding")]
    InvalidKey,
    #[error("invalid signature encoding")]
    InvalidSignature,
    #[error("invalid ciphertext encoding")]
    InvalidCiphertext,
    #[error("AEAD seal/open failed")]
    AeadFailure,
    #[error("hex decode failed: {0}")]
    HexDecode(#[from] hex::FromHexError),
    #[error("base64 decode failed: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

pub type Result<T> = std::result::Result<T, CryptoError>;

/// ML-DSA-87 (CRYSTALS-Dilithium5) public key size in bytes.
pub const SIGN_PUBLIC_KEY_BYTES: usize = pq::DILITHIUM_PUBLIC_KEY_BYTES;
/// ML-DSA-87 secret key size in bytes.
pub const SIGN_SECRET_KEY_BYTES: usize = pq::DILITHIUM_SECRET_KEY_BYTES;
/// Maximum ML-DSA-87 detached signature size in bytes (spec §4.1).
pub const SIGN_MAX_SIGNATURE_BYTES: usize = 4627;

/// ML-KEM-1024 (CRYSTALS-Kyber1024) public key size in bytes.
pub const KEM_PUBLIC_KEY_BYTES: usize = pq::KYBER_PUBLIC_KEY_BYTES;
/// ML-KEM-1024 secret key size in bytes.
pub const KEM_SECRET_KEY_BYTES: usize = pq::KYBER_SECRET_KEY_BYTES;
/// ML-KEM-1024 ciphertext size in bytes.
pub const KEM_CIPHERTEXT_BYTES: usize = pq::KYBER_CIPHERTEXT_BYTES;

pub use aead::{aead_open, aead_seal, random_bytes, AeadSealed, AES_IV_LEN, AES_KEY_LEN, AES_TAG_LEN};
pub use encoding::{from_hex, to_base64, to_hex, from_base64};
pub use hash::{sha256, sha3_512};
pub use pq::{
    kem_decapsulate, kem_encapsulate, sign, sign_keypair, verify, KemKeypair, SignKeypair,
};
pub use time::{now_unix_ms, now_unix_secs};
