//! Collection records (C8, spec §3, §4.7): self-encrypted group lists and
//! contact lists. Single-owner, single-slot keys — the owner is both
//! sender and recipient, so only they can ever decrypt their own list.
//!
//! Binary envelope (spec §3):
//! `magic(4) | version(1) | timestamp(8 BE) | expiry(8 BE) | enc_len(4 BE)
//!  | encrypted_payload | sig_len(4 BE) | signature`.
//! `encrypted_payload` is itself `kem_ct(1568) | iv(12) | tag(16) |
//! ciphertext`, and the plaintext it decrypts to is a second JSON
//! envelope carrying its own embedded signature — see module docs on
//! [`publish_collection`] for why there are two signatures.

use serde::{Deserialize, Serialize};

use dna_chunked::ChunkedLayer;
use dna_crypto::{
    aead_open, aead_seal, kem_decapsulate, kem_encapsulate, now_unix_secs, random_bytes, sign,
    verify, AES_IV_LEN, AES_TAG_LEN, KEM_CIPHERTEXT_BYTES,
};

use crate::codec::{canonical_bytes, dht_key};
use crate::error::{DnaError, Result};

pub const ENVELOPE_VERSION: u8 = 1;
pub const COLLECTION_TTL_SECS: u64 = 365 * 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Group,
    Contact,
}

impl CollectionKind {
    fn magic(self) -> [u8; 4] {
        match self {
            CollectionKind::Group => *b"GLST",
            CollectionKind::Contact => *b"CLST",
        }
    }

    fn key_suffix(self) -> &'static str {
        match self {
            CollectionKind::Group => "grouplist",
            CollectionKind::Contact => "contactlist",
        }
    }
}

/// DHT key for `owner_fp`'s list of kind `kind` (spec §6).
pub fn collection_key(owner_fp: &str, kind: CollectionKind) -> String {
    dht_key(&format!("{owner_fp}:{}", kind.key_suffix()))
}

/// The JSON payload encrypted inside the envelope (spec §3): the `items`
/// field name is `groups` or `contacts` depending on `kind`, but we model
/// it uniformly as `items` and only surface the right key name at the
/// wire boundary via `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InnerPayload {
    identity: String,
    version: u64,
    timestamp: u64,
    items: Vec<String>,
    #[serde(default)]
    signature: Vec<u8>,
}

/// Decoded, verified collection list — what callers of `fetch_collection`
/// actually want.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub owner_fp: String,
    pub version: u64,
    pub timestamp: u64,
    pub items: Vec<String>,
}

/// Publish `items` as `owner_fp`'s group/contact list (spec §4.7).
///
/// Two signatures are produced, both by the same signing key, because the
/// spec's byte envelope (§3) carries an outer `signature` field covering
/// the frame header — so a single flipped header byte is rejected before
/// any decryption is attempted — while the fetch path (§4.7) separately
/// verifies "the signature field inside the decrypted envelope", which
/// only exists once you're past decryption. We sign the inner plaintext
/// first, embed that signature in the payload that gets encrypted, then
/// sign the assembled (still-opaque) frame header for the outer field.
pub fn publish_collection(
    kind: CollectionKind,
    owner_fp: &str,
    items: Vec<String>,
    version: u64,
    signing_secret_key: &[u8],
    enc_public_key: &[u8],
) -> Result<Vec<u8>> {
    let timestamp = now_unix_secs();
    let expiry = timestamp + COLLECTION_TTL_SECS;

    let mut inner = InnerPayload {
        identity: owner_fp.to_string(),
        version,
        timestamp,
        items,
        signature: Vec::new(),
    };
    let inner_unsigned = canonical_bytes(&inner, &["signature"])?;
    inner.signature = sign(&inner_unsigned, signing_secret_key)?;
    let inner_bytes = serde_json::to_vec(&inner)?;

    let (ct_kem, shared_secret) = kem_encapsulate(enc_public_key)?;
    let iv = random_bytes(AES_IV_LEN);
    let sealed = aead_seal(&shared_secret, &iv, &[], &inner_bytes)?;

    let mut encrypted_payload = Vec::with_capacity(ct_kem.len() + iv.len() + AES_TAG_LEN + sealed.ciphertext.len());
    encrypted_payload.extend_from_slice(&ct_kem);
    encrypted_payload.extend_from_slice(&iv);
    encrypted_payload.extend_from_slice(&sealed.tag);
    encrypted_payload.extend_from_slice(&sealed.ciphertext);

    let mut header = Vec::new();
    header.extend_from_slice(&kind.magic());
    header.push(ENVELOPE_VERSION);
    header.extend_from_slice(&timestamp.to_be_bytes());
    header.extend_from_slice(&expiry.to_be_bytes());
    header.extend_from_slice(&(encrypted_payload.len() as u32).to_be_bytes());
    header.extend_from_slice(&encrypted_payload);

    let outer_sig = sign(&header, signing_secret_key)?;

    let mut frame = header;
    frame.extend_from_slice(&(outer_sig.len() as u32).to_be_bytes());
    frame.extend_from_slice(&outer_sig);
    Ok(frame)
}

/// Parse, verify, and decrypt a collection frame (spec §4.7). Rejects on
/// magic/version mismatch or length overflow (`Framing`), on `expiry <
/// now` (`NotFound`), on outer/inner signature mismatch
/// (`SignatureInvalid`), on AEAD failure (`DecryptionFailed`), and on the
/// embedded `identity` not matching `expected_owner_fp` (the
/// self-encryption check, `OwnershipViolation`).
pub fn parse_collection_frame(
    kind: CollectionKind,
    frame: &[u8],
    expected_owner_fp: &str,
    signing_public_key: &[u8],
    enc_secret_key: &[u8],
    now: u64,
) -> Result<Collection> {
    if frame.len() < 4 + 1 + 8 + 8 + 4 {
        return Err(DnaError::Framing("frame shorter than fixed header".into()));
    }
    if frame[0..4] != kind.magic() {
        return Err(DnaError::Framing("magic mismatch".into()));
    }
    if frame[4] != ENVELOPE_VERSION {
        return Err(DnaError::Framing("version mismatch".into()));
    }
    let timestamp = u64::from_be_bytes(frame[5..13].try_into().unwrap());
    let expiry = u64::from_be_bytes(frame[13..21].try_into().unwrap());
    let enc_len = u32::from_be_bytes(frame[21..25].try_into().unwrap()) as usize;

    let payload_start = 25;
    let payload_end = payload_start
        .checked_add(enc_len)
        .ok_or_else(|| DnaError::Framing("encrypted length overflow".into()))?;
    if frame.len() < payload_end + 4 {
        return Err(DnaError::Framing("frame shorter than declared encrypted length".into()));
    }

    let header = &frame[..payload_end];
    let encrypted_payload = &frame[payload_start..payload_end];
    let sig_len_start = payload_end;
    let sig_len =
        u32::from_be_bytes(frame[sig_len_start..sig_len_start + 4].try_into().unwrap()) as usize;
    let sig_start = sig_len_start + 4;
    let sig_end = sig_start
        .checked_add(sig_len)
        .ok_or_else(|| DnaError::Framing("signature length overflow".into()))?;
    if frame.len() != sig_end {
        return Err(DnaError::Framing("trailing bytes after signature".into()));
    }
    let outer_sig = &frame[sig_start..sig_end];

    if !verify(outer_sig, header, signing_public_key)? {
        return Err(DnaError::SignatureInvalid);
    }

    if expiry < now {
        return Err(DnaError::NotFound);
    }

    if encrypted_payload.len() < KEM_CIPHERTEXT_BYTES + AES_IV_LEN + AES_TAG_LEN {
        return Err(DnaError::Framing("encrypted payload too short".into()));
    }
    let (ct_kem, rest) = encrypted_payload.split_at(KEM_CIPHERTEXT_BYTES);
    let (iv, rest) = rest.split_at(AES_IV_LEN);
    let (tag_slice, ciphertext) = rest.split_at(AES_TAG_LEN);
    let mut tag = [0u8; AES_TAG_LEN];
    tag.copy_from_slice(tag_slice);

    let shared_secret =
        kem_decapsulate(ct_kem, enc_secret_key).map_err(|_| DnaError::DecryptionFailed)?;
    let inner_bytes = aead_open(&shared_secret, iv, &[], ciphertext, &tag)
        .map_err(|_| DnaError::DecryptionFailed)?;

    let inner: InnerPayload =
        serde_json::from_slice(&inner_bytes).map_err(|e| DnaError::Framing(e.to_string()))?;
    let inner_unsigned = canonical_bytes(&inner, &["signature"])?;
    if !verify(&inner.signature, &inner_unsigned, signing_public_key)? {
        return Err(DnaError::SignatureInvalid);
    }
    if inner.identity != expected_owner_fp {
        return Err(DnaError::OwnershipViolation);
    }
    if inner.timestamp != timestamp {
        return Err(DnaError::Framing("inner/outer timestamp mismatch".into()));
    }

    Ok(Collection {
        owner_fp: inner.identity,
        version: inner.version,
        timestamp: inner.timestamp,
        items: inner.items,
    })
}

/// Publish then immediately fetch-through the chunked layer (spec
/// §4.7 step 5: "Publish via chunked layer, 365-day TTL").
pub async fn store_collection(
    chunked: &dyn ChunkedLayer,
    kind: CollectionKind,
    owner_fp: &str,
    items: Vec<String>,
    version: u64,
    signing_secret_key: &[u8],
    enc_public_key: &[u8],
) -> Result<()> {
    let frame = publish_collection(kind, owner_fp, items, version, signing_secret_key, enc_public_key)?;
    let key = collection_key(owner_fp, kind);
    chunked
        .publish(&key, owner_fp, frame, COLLECTION_TTL_SECS)
        .await?;
    Ok(())
}

pub async fn fetch_collection(
    chunked: &dyn ChunkedLayer,
    kind: CollectionKind,
    owner_fp: &str,
    signing_public_key: &[u8],
    enc_secret_key: &[u8],
) -> Result<Collection> {
    let key = collection_key(owner_fp, kind);
    let frame = chunked.fetch(&key).await.map_err(|_| DnaError::NotFound)?;
    parse_collection_frame(kind, &frame, owner_fp, signing_public_key, enc_secret_key, now_unix_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_chunked::InMemoryChunkedLayer;
    use dna_crypto::sign_keypair;
    use pqcrypto_kyber::kyber1024;
    use pqcrypto_traits::kem::{PublicKey as _, SecretKey as _};

    fn kem_pair() -> (Vec<u8>, Vec<u8>) {
        let (pk, sk) = kyber1024::keypair();
        (pk.as_bytes().to_vec(), sk.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn self_encrypted_roundtrip() {
        let sign_kp = sign_keypair();
        let (enc_pk, enc_sk) = kem_pair();
        let chunked = InMemoryChunkedLayer::new();
        let fp = "owner-fp";

        store_collection(
            &chunked,
            CollectionKind::Group,
            fp,
            vec!["g1".into(), "g2".into()],
            1,
            &sign_kp.secret_key,
            &enc_pk,
        )
        .await
        .unwrap();

        let fetched = fetch_collection(
            &chunked,
            CollectionKind::Group,
            fp,
            &sign_kp.public_key,
            &enc_sk,
        )
        .await
        .unwrap();
        assert_eq!(fetched.items, vec!["g1", "g2"]);
    }

    #[tokio::test]
    async fn wrong_kem_key_is_decryption_failure() {
        let sign_kp = sign_keypair();
        let (enc_pk, _enc_sk) = kem_pair();
        let (_, wrong_sk) = kem_pair();
        let chunked = InMemoryChunkedLayer::new();
        let fp = "owner-fp";

        store_collection(
            &chunked,
            CollectionKind::Contact,
            fp,
            vec!["bob".into()],
            1,
            &sign_kp.secret_key,
            &enc_pk,
        )
        .await
        .unwrap();

        let err = fetch_collection(
            &chunked,
            CollectionKind::Contact,
            fp,
            &sign_kp.public_key,
            &wrong_sk,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DnaError::DecryptionFailed));
    }

    #[test]
    fn flipped_header_byte_is_never_silent_success() {
        let sign_kp = sign_keypair();
        let (enc_pk, enc_sk) = kem_pair();
        let fp = "owner-fp";
        let mut frame = publish_collection(
            CollectionKind::Group,
            fp,
            vec!["g1".into()],
            1,
            &sign_kp.secret_key,
            &enc_pk,
        )
        .unwrap();
        frame[10] ^= 0xFF;
        let result = parse_collection_frame(
            CollectionKind::Group,
            &frame,
            fp,
            &sign_kp.public_key,
            &enc_sk,
            now_unix_secs(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn expired_frame_is_not_found() {
        let sign_kp = sign_keypair();
        let (enc_pk, enc_sk) = kem_pair();
        let fp = "owner-fp";
        let frame = publish_collection(
            CollectionKind::Group,
            fp,
            vec!["g1".into()],
            1,
            &sign_kp.secret_key,
            &enc_pk,
        )
        .unwrap();
        let far_future = now_unix_secs() + COLLECTION_TTL_SECS + 1;
        let result = parse_collection_frame(
            CollectionKind::Group,
            &frame,
            fp,
            &sign_kp.public_key,
            &enc_sk,
            far_future,
        );
        assert!(matches!(result, Err(DnaError::NotFound)));
    }
}
