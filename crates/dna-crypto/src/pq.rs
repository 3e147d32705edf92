//! Post-quantum primitive wrappers: ML-DSA-87 (CRYSTALS-Dilithium5) for
//! signatures, ML-KEM-1024 (CRYSTALS-Kyber1024) for key encapsulation.
//!
//! Grounded on the reference workspace's `lib-crypto/src/post_quantum/*`
//! wrappers, switched from the attached-`SignedMessage` Dilithium API to
//! `detached_sign`/`verify_detached_signature` because record codecs need a
//! signature that travels separately from the signed payload (spec §4.6),
//! and bumped from Kyber512/Dilithium2 to the Level-5 Kyber1024/Dilithium5
//! parameter sets the spec names explicitly.

use pqcrypto_dilithium::dilithium5;
use pqcrypto_kyber::kyber1024;
use pqcrypto_traits::kem::{
    Ciphertext as KemCiphertextTrait, PublicKey as KemPublicKeyTrait,
    SecretKey as KemSecretKeyTrait, SharedSecret as KemSharedSecretTrait,
};
use pqcrypto_traits::sign::{
    DetachedSignature as DetachedSignatureTrait, PublicKey as SignPublicKeyTrait,
    SecretKey as SignSecretKeyTrait,
};

use crate::{CryptoError, Result};

pub const DILITHIUM_PUBLIC_KEY_BYTES: usize = 2592;
pub const DILITHIUM_SECRET_KEY_BYTES: usize = 4864;
pub const KYBER_PUBLIC_KEY_BYTES: usize = 1568;
pub const KYBER_SECRET_KEY_BYTES: usize = 3168;
pub const KYBER_CIPHERTEXT_BYTES: usize = 1568;

/// A freshly generated ML-DSA-87 keypair.
#[derive(Clone)]
pub struct SignKeypair {
    pub public_key: Vec<u8>,
    pub secret_key: Vec<u8>,
}

/// A freshly generated ML-KEM-1024 keypair.
#[derive(Clone)]
pub struct KemKeypair {
    pub public_key: Vec<u8>,
    pub secret_key: Vec<u8>,
}

/// Generate a new ML-DSA-87 identity keypair.
pub fn sign_keypair() -> SignKeypair {
    let (pk, sk) = dilithium5::keypair();
    SignKeypair {
        public_key: pk.as_bytes().to_vec(),
        secret_key: sk.as_bytes().to_vec(),
    }
}

/// Sign `msg` with an ML-DSA-87 secret key, returning a detached signature
/// (at most `SIGN_MAX_SIGNATURE_BYTES` long).
pub fn sign(msg: &[u8], secret_key: &[u8]) -> Result<Vec<u8>> {
    let sk = dilithium5::SecretKey::from_bytes(secret_key).map_err(|_| CryptoError::InvalidKey)?;
    let sig = dilithium5::detached_sign(msg, &sk);
    Ok(sig.as_bytes().to_vec())
}

/// Verify a detached ML-DSA-87 signature over `msg`. Signature-invalid and
/// malformed-input are both surfaced as `Ok(false)` — callers that need to
/// distinguish "didn't parse" from "didn't verify" should validate lengths
/// up front; this function's contract is strictly boolean per spec §4.1.
pub fn verify(sig: &[u8], msg: &[u8], public_key: &[u8]) -> Result<bool> {
    let pk = dilithium5::PublicKey::from_bytes(public_key).map_err(|_| CryptoError::InvalidKey)?;
    let signature = match dilithium5::DetachedSignature::from_bytes(sig) {
        Ok(s) => s,
        Err(_) => return Ok(false),
    };
    Ok(dilithium5::verify_detached_signature(&signature, msg, &pk).is_ok())
}

/// Encapsulate a shared secret against an ML-KEM-1024 public key. Returns
/// `(ciphertext, shared_secret)` per spec §4.1.
pub fn kem_encapsulate(public_key: &[u8]) -> Result<(Vec<u8>, [u8; 32])> {
    let pk = kyber1024::PublicKey::from_bytes(public_key).map_err(|_| CryptoError::InvalidKey)?;
    let (shared_secret, ciphertext) = kyber1024::encapsulate(&pk);
    let mut ss = [0u8; 32];
    let bytes = shared_secret.as_bytes();
    let n = bytes.len().min(32);
    ss[..n].copy_from_slice(&bytes[..n]);
    Ok((ciphertext.as_bytes().to_vec(), ss))
}

/// Decapsulate a shared secret with an ML-KEM-1024 secret key.
pub fn kem_decapsulate(ciphertext: &[u8], secret_key: &[u8]) -> Result<[u8; 32]> {
    let sk =
        kyber1024::SecretKey::from_bytes(secret_key).map_err(|_| CryptoError::InvalidKey)?;
    let ct = kyber1024::Ciphertext::from_bytes(ciphertext)
        .map_err(|_| CryptoError::InvalidCiphertext)?;
    let shared_secret = kyber1024::decapsulate(&ct, &sk);
    let mut ss = [0u8; 32];
    let bytes = shared_secret.as_bytes();
    let n = bytes.len().min(32);
    ss[..n].copy_from_slice(&bytes[..n]);
    Ok(ss)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_roundtrip() {
        let kp = sign_keypair();
        let msg = b"dna:feeds:topic:unit-test";
        let sig = sign(msg, &kp.secret_key).unwrap();
        assert!(verify(&sig, msg, &kp.public_key).unwrap());
        assert!(!verify(&sig, b"tampered", &kp.public_key).unwrap());
    }

    #[test]
    fn kem_roundtrip() {
        let (pk, sk) = kyber1024::keypair();
        let (ct, ss_a) = kem_encapsulate(pk.as_bytes()).unwrap();
        let ss_b = kem_decapsulate(&ct, sk.as_bytes()).unwrap();
        assert_eq!(ss_a, ss_b);
    }
}
