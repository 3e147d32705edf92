//! Identity backup & recovery (C5, spec §4.4): sealing the node's signing
//! identity under its own ML-KEM-1024 encryption key so it can be
//! recovered on any device from the corresponding secret key alone.

use dna_chunked::ChunkedLayer;
use dna_crypto::{
    aead_open, aead_seal, kem_decapsulate, kem_encapsulate, random_bytes, sha256, sha3_512, to_hex,
    AES_IV_LEN, AES_TAG_LEN, KEM_CIPHERTEXT_BYTES,
};

use crate::error::{IdentityError, Result};

pub const IDENTITY_BACKUP_TTL_SECS: u64 = 365 * 86_400;

/// The raw material a node's permanent signing identity is made of:
/// secret key plus a self-signed certificate (public key + signature over
/// it), serialized length-prefixed per spec §4.4 step 2.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawIdentityMaterial {
    pub signing_secret_key: Vec<u8>,
    pub cert: Vec<u8>,
}

impl RawIdentityMaterial {
    /// `[key_len(4 BE)][key][cert_len(4 BE)][cert]`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.signing_secret_key.len() + self.cert.len());
        out.extend_from_slice(&(self.signing_secret_key.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.signing_secret_key);
        out.extend_from_slice(&(self.cert.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.cert);
        out
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        if buf.len() < 4 {
            return Err(IdentityError::Framing("buffer too short for key length".into()));
        }
        let key_len = u32::from_be_bytes(buf[0..4].try_into().unwrap()) as usize;
        let key_start = 4;
        let key_end = key_start
            .checked_add(key_len)
            .ok_or_else(|| IdentityError::Framing("key length overflow".into()))?;
        if buf.len() < key_end + 4 {
            return Err(IdentityError::Framing("buffer too short for cert length".into()));
        }
        let signing_secret_key = buf[key_start..key_end].to_vec();
        let cert_len_start = key_end;
        let cert_len =
            u32::from_be_bytes(buf[cert_len_start..cert_len_start + 4].try_into().unwrap())
                as usize;
        let cert_start = cert_len_start + 4;
        let cert_end = cert_start
            .checked_add(cert_len)
            .ok_or_else(|| IdentityError::Framing("cert length overflow".into()))?;
        if buf.len() < cert_end {
            return Err(IdentityError::Framing("buffer too short for cert body".into()));
        }
        Ok(Self {
            signing_secret_key,
            cert: buf[cert_start..cert_end].to_vec(),
        })
    }
}

/// `ct_kem(1568) || iv(12) || tag(16) || body` (spec §4.4 step 3).
#[derive(Debug, Clone)]
pub struct SealedBlob(pub Vec<u8>);

impl SealedBlob {
    pub const MIN_LEN: usize = KEM_CIPHERTEXT_BYTES + AES_IV_LEN + AES_TAG_LEN;
}

/// Seal `material` for `enc_public_key` (spec §4.4 step 3).
pub fn seal_identity(material: &RawIdentityMaterial, enc_public_key: &[u8]) -> Result<SealedBlob> {
    let (ct_kem, shared_secret) = kem_encapsulate(enc_public_key)?;
    let iv = random_bytes(AES_IV_LEN);
    let plaintext = material.serialize();
    let sealed = aead_seal(&shared_secret, &iv, &[], &plaintext)?;

    let mut blob = Vec::with_capacity(ct_kem.len() + iv.len() + AES_TAG_LEN + sealed.ciphertext.len());
    blob.extend_from_slice(&ct_kem);
    blob.extend_from_slice(&iv);
    blob.extend_from_slice(&sealed.tag);
    blob.extend_from_slice(&sealed.ciphertext);
    Ok(SealedBlob(blob))
}

/// Reverse `seal_identity`. An AEAD tag mismatch surfaces as
/// `DecryptionFailed`, a fatal error distinct from "not found" (spec
/// §4.4, §7).
pub fn open_sealed_blob(blob: &SealedBlob, enc_secret_key: &[u8]) -> Result<RawIdentityMaterial> {
    let bytes = &blob.0;
    if bytes.len() < SealedBlob::MIN_LEN {
        return Err(IdentityError::Framing("blob shorter than minimum length".into()));
    }
    let (ct_kem, rest) = bytes.split_at(KEM_CIPHERTEXT_BYTES);
    let (iv, rest) = rest.split_at(AES_IV_LEN);
    let (tag_slice, ciphertext) = rest.split_at(AES_TAG_LEN);
    let mut tag = [0u8; AES_TAG_LEN];
    tag.copy_from_slice(tag_slice);

    let shared_secret = kem_decapsulate(ct_kem, enc_secret_key)
        .map_err(|_| IdentityError::DecryptionFailed)?;
    let plaintext = aead_open(&shared_secret, iv, &[], ciphertext, &tag)
        .map_err(|_| IdentityError::DecryptionFailed)?;

    RawIdentityMaterial::deserialize(&plaintext)
}

/// DHT key an identity backup is published under: `SHA-256("<fp>:dht_identity")`.
pub fn backup_key(fingerprint: &str) -> String {
    to_hex(&sha256(format!("{fingerprint}:dht_identity").as_bytes()))
}

/// Publish a sealed blob to the chunked layer with the 365-day TTL from
/// spec §4.4. Single-owner key: the owner is the identity's own
/// fingerprint.
pub async fn publish_identity_backup(
    chunked: &dyn ChunkedLayer,
    fingerprint: &str,
    blob: &SealedBlob,
) -> Result<()> {
    let key = backup_key(fingerprint);
    chunked
        .publish(&key, fingerprint, blob.0.clone(), IDENTITY_BACKUP_TTL_SECS)
        .await?;
    Ok(())
}

/// Recover identity material from the DHT on a new device (spec §4.4
/// "Recovery"). `expected_fingerprint` must equal
/// `SHA-3-512(signing_pubkey)` of the recovered certificate's public key
/// — a mismatch is a framing-level failure, never a silent success.
pub async fn recover_from_dht(
    chunked: &dyn ChunkedLayer,
    expected_fingerprint: &str,
    enc_secret_key: &[u8],
    cert_public_key: impl Fn(&[u8]) -> Result<Vec<u8>>,
) -> Result<RawIdentityMaterial> {
    let key = backup_key(expected_fingerprint);
    let bytes = chunked
        .fetch(&key)
        .await
        .map_err(|_| IdentityError::NotFound)?;
    let material = open_sealed_blob(&SealedBlob(bytes), enc_secret_key)?;
    let signing_pk = cert_public_key(&material.cert)?;
    let derived_fp = to_hex(&sha3_512(&signing_pk));
    if derived_fp != expected_fingerprint {
        return Err(IdentityError::Framing(
            "recovered fingerprint does not match requested fingerprint".into(),
        ));
    }
    Ok(material)
}

/// Write the sealed blob to `~/.dna/<fp>/dht_identity.enc` with owner-only
/// permissions (spec §4.4 step 4, §6).
pub fn write_blob_to_disk(base_dir: &std::path::Path, fingerprint: &str, blob: &SealedBlob) -> Result<std::path::PathBuf> {
    let dir = base_dir.join(fingerprint);
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("dht_identity.enc");
    std::fs::write(&path, &blob.0)?;
    set_owner_only_permissions(&path)?;
    Ok(path)
}

pub fn read_blob_from_disk(base_dir: &std::path::Path, fingerprint: &str) -> Result<SealedBlob> {
    let path = base_dir.join(fingerprint).join("dht_identity.enc");
    let bytes = std::fs::read(&path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            IdentityError::NotFound
        } else {
            IdentityError::Io(e)
        }
    })?;
    Ok(SealedBlob(bytes))
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &std::path::Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &std::path::Path) -> Result<()> {
    Ok(())
}
