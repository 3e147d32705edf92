//! AEAD sealing (AES-256-GCM) and uniform random bytes.
//!
//! Grounded on the reference workspace's `lib-identity` use of `aes-gcm`
//! for at-rest encryption (`lib-identity/Cargo.toml`); spec §4.1 names
//! AES-256-GCM explicitly rather than the reference workspace's
//! ChaCha20-Poly1305 default, so we follow the spec here.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;

use crate::{CryptoError, Result};

pub const AES_KEY_LEN: usize = 32;
pub const AES_IV_LEN: usize = 12;
pub const AES_TAG_LEN: usize = 16;

/// Result of a successful seal: ciphertext and detached tag, kept separate
/// so envelope formats (spec §3) can lay them out independently.
pub struct AeadSealed {
    pub ciphertext: Vec<u8>,
    pub tag: [u8; AES_TAG_LEN],
}

/// Seal `plaintext` under `key`/`iv` with additional authenticated data
/// `aad`. `key` and `iv` must be exactly `AES_KEY_LEN`/`AES_IV_LEN` bytes.
pub fn aead_seal(key: &[u8], iv: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<AeadSealed> {
    let cipher = build_cipher(key)?;
    let nonce = Nonce::from_slice(iv);
    let combined = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CryptoError::AeadFailure)?;
    if combined.len() < AES_TAG_LEN {
        return Err(CryptoError::AeadFailure);
    }
    let split_at = combined.len() - AES_TAG_LEN;
    let (ct, tag_slice) = combined.split_at(split_at);
    let mut tag = [0u8; AES_TAG_LEN];
    tag.copy_from_slice(tag_slice);
    Ok(AeadSealed {
        ciphertext: ct.to_vec(),
        tag,
    })
}

/// Open a previously sealed blob. Any failure — wrong key, flipped byte in
/// ciphertext/tag/aad — is collapsed to `CryptoError::AeadFailure`; callers
/// translate that to `DecryptionFailed` (spec §7), never to `NotFound`.
pub fn aead_open(
    key: &[u8],
    iv: &[u8],
    aad: &[u8],
    ciphertext: &[u8],
    tag: &[u8; AES_TAG_LEN],
) -> Result<Vec<u8>> {
    let cipher = build_cipher(key)?;
    let nonce = Nonce::from_slice(iv);
    let mut combined = Vec::with_capacity(ciphertext.len() + AES_TAG_LEN);
    combined.extend_from_slice(ciphertext);
    combined.extend_from_slice(tag);
    cipher
        .decrypt(nonce, Payload { msg: &combined, aad })
        .map_err(|_| CryptoError::AeadFailure)
}

fn build_cipher(key: &[u8]) -> Result<Aes256Gcm> {
    if key.len() != AES_KEY_LEN {
        return Err(CryptoError::InvalidKey);
    }
    let key = Key::<Aes256Gcm>::from_slice(key);
    Ok(Aes256Gcm::new(key))
}

/// Uniform random bytes via the OS RNG (spec §4.1).
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut buf = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}
