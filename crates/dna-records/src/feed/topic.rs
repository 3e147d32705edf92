//! Feed topics (C9, spec §4.8).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dna_chunked::ChunkedLayer;
use dna_crypto::{now_unix_secs, sha256, sign, to_hex, verify};

use crate::codec::{canonical_bytes, dht_key};
use crate::error::{DnaError, Result};
use crate::feed::index::{day_bucket, publish_index_entries};

pub const TOPIC_TTL_SECS: u64 = 30 * 86_400;
pub const TITLE_MAX_LEN: usize = 200;
pub const BODY_MAX_LEN: usize = 4_000;
pub const TAG_MAX_COUNT: usize = 5;
pub const TAG_MAX_LEN: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    pub version: u32,
    pub topic_uuid: String,
    pub author_fp: String,
    pub title: String,
    pub body: String,
    pub category_id: String,
    pub tags: Vec<String>,
    pub created_at: u64,
    pub deleted: bool,
    pub deleted_at: Option<u64>,
    #[serde(default)]
    pub signature: Vec<u8>,
}

pub fn topic_key(uuid: &str) -> String {
    dht_key(&format!("dna:feeds:topic:{uuid}"))
}

/// `category_id = sha256(lowercase(name))`, 64 hex chars (spec §3, §4.8).
pub fn category_id_of(name: &str) -> String {
    to_hex(&sha256(name.to_lowercase().as_bytes()))
}

fn validate_fields(title: &str, body: &str, tags: &[String]) -> Result<()> {
    if title.is_empty() || title.chars().count() > TITLE_MAX_LEN {
        return Err(DnaError::Validation(format!(
            "title must be 1..={TITLE_MAX_LEN} chars"
        )));
    }
    if body.chars().count() > BODY_MAX_LEN {
        return Err(DnaError::Validation(format!(
            "body must be at most {BODY_MAX_LEN} chars"
        )));
    }
    if tags.len() > TAG_MAX_COUNT {
        return Err(DnaError::Validation(format!(
            "at most {TAG_MAX_COUNT} tags allowed"
        )));
    }
    if tags.iter().any(|t| t.chars().count() > TAG_MAX_LEN) {
        return Err(DnaError::Validation(format!(
            "each tag must be at most {TAG_MAX_LEN} chars"
        )));
    }
    Ok(())
}

fn verify_topic(topic: &Topic, signing_public_key: &[u8]) -> Result<()> {
    let unsigned = canonical_bytes(topic, &["signature"])?;
    if !verify(&topic.signature, &unsigned, signing_public_key)? {
        return Err(DnaError::SignatureInvalid);
    }
    Ok(())
}

/// Create, sign, and publish a topic, then best-effort index it into both
/// its category and global day buckets (spec §4.8). Index failures are
/// logged, never propagated — the topic remains reachable by UUID.
pub async fn create_topic(
    chunked: &dyn ChunkedLayer,
    author_fp: &str,
    title: &str,
    body: &str,
    category_name: &str,
    tags: Vec<String>,
    signing_secret_key: &[u8],
) -> Result<Topic> {
    validate_fields(title, body, &tags)?;

    let created_at = now_unix_secs();
    let mut topic = Topic {
        version: 1,
        topic_uuid: Uuid::new_v4().to_string(),
        author_fp: author_fp.to_string(),
        title: title.to_string(),
        body: body.to_string(),
        category_id: category_id_of(category_name),
        tags,
        created_at,
        deleted: false,
        deleted_at: None,
        signature: Vec::new(),
    };
    let unsigned = canonical_bytes(&topic, &["signature"])?;
    topic.signature = sign(&unsigned, signing_secret_key)?;

    let bytes = serde_json::to_vec(&topic)?;
    chunked
        .publish(&topic_key(&topic.topic_uuid), author_fp, bytes, TOPIC_TTL_SECS)
        .await?;

    let date = day_bucket(created_at);
    if let Err(err) = publish_index_entries(chunked, &topic, &date).await {
        tracing::warn!(topic_uuid = %topic.topic_uuid, error = %err, "feed index publish failed");
    }

    Ok(topic)
}

/// Fetch and verify a topic. Callers that only need existence/visibility
/// (e.g. honoring `deleted`) still get a verified record back — an
/// unverifiable topic is never surfaced (spec §4.1, §4.8).
pub async fn get_topic(chunked: &dyn ChunkedLayer, uuid: &str, signing_public_key: &[u8]) -> Result<Topic> {
    let bytes = chunked.fetch(&topic_key(uuid)).await.map_err(|_| DnaError::NotFound)?;
    let topic: Topic = serde_json::from_slice(&bytes)?;
    verify_topic(&topic, signing_public_key)?;
    Ok(topic)
}

/// Soft-delete: verify ownership, flip `deleted`, re-sign, republish at the
/// same key, and republish index entries into the topic's **original** day
/// buckets with `deleted=true` (spec §4.8, §9 open question — source only
/// ever targets the original buckets, so we do too).
pub async fn delete_topic(
    chunked: &dyn ChunkedLayer,
    uuid: &str,
    caller_fp: &str,
    signing_public_key: &[u8],
    signing_secret_key: &[u8],
) -> Result<Topic> {
    let mut topic = get_topic(chunked, uuid, signing_public_key).await?;
    if topic.author_fp != caller_fp {
        return Err(DnaError::NotOwner);
    }

    topic.deleted = true;
    topic.deleted_at = Some(now_unix_secs());
    let unsigned = canonical_bytes(&topic, &["signature"])?;
    topic.signature = sign(&unsigned, signing_secret_key)?;

    let bytes = serde_json::to_vec(&topic)?;
    chunked
        .publish(&topic_key(uuid), caller_fp, bytes, TOPIC_TTL_SECS)
        .await?;

    let date = day_bucket(topic.created_at);
    if let Err(err) = publish_index_entries(chunked, &topic, &date).await {
        tracing::warn!(topic_uuid = %uuid, error = %err, "feed index delete-republish failed");
    }

    Ok(topic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_chunked::InMemoryChunkedLayer;
    use dna_crypto::sign_keypair;

    #[tokio::test]
    async fn create_get_delete_roundtrip() {
        let chunked = InMemoryChunkedLayer::new();
        let alice = sign_keypair();
        let topic = create_topic(
            &chunked,
            "alice-fp",
            "Hi",
            "body",
            "general",
            vec![],
            &alice.secret_key,
        )
        .await
        .unwrap();
        assert_eq!(topic.category_id, category_id_of("general"));

        let fetched = get_topic(&chunked, &topic.topic_uuid, &alice.public_key).await.unwrap();
        assert!(!fetched.deleted);

        let bob = sign_keypair();
        let err = delete_topic(&chunked, &topic.topic_uuid, "bob-fp", &alice.public_key, &bob.secret_key)
            .await
            .unwrap_err();
        assert!(matches!(err, DnaError::NotOwner));

        let deleted = delete_topic(
            &chunked,
            &topic.topic_uuid,
            "alice-fp",
            &alice.public_key,
            &alice.secret_key,
        )
        .await
        .unwrap();
        assert!(deleted.deleted);

        let refetched = get_topic(&chunked, &topic.topic_uuid, &alice.public_key).await.unwrap();
        assert!(refetched.deleted);
    }

    #[test]
    fn title_too_long_is_rejected() {
        let long_title = "x".repeat(TITLE_MAX_LEN + 1);
        assert!(validate_fields(&long_title, "b", &[]).is_err());
    }
}
