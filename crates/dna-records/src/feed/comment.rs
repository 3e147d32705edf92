//! Feed comments (C9, spec §4.9): multi-owner, single-level threading.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dna_chunked::ChunkedLayer;
use dna_crypto::{now_unix_secs, sign, verify};

use crate::codec::{canonical_bytes, dht_key};
use crate::error::{DnaError, Result};
use crate::feed::topic::TOPIC_TTL_SECS;

pub const BODY_MAX_LEN: usize = 2_000;
pub const MENTIONS_MAX: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub version: u32,
    pub comment_uuid: String,
    pub topic_uuid: String,
    #[serde(default)]
    pub parent_comment_uuid: String,
    pub author_fp: String,
    pub body: String,
    pub mentions: Vec<String>,
    pub created_at: u64,
    #[serde(default)]
    pub signature: Vec<u8>,
}

pub fn comments_key(topic_uuid: &str) -> String {
    dht_key(&format!("dna:feeds:topic:{topic_uuid}:comments"))
}

/// Merge every author's comment slot for `topic_uuid`. A slot that fails
/// to parse is skipped rather than failing the whole fetch (spec §4.9).
async fn fetch_all_raw(chunked: &dyn ChunkedLayer, topic_uuid: &str) -> Vec<Comment> {
    let key = comments_key(topic_uuid);
    let slots = match chunked.fetch_all(&key).await {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let mut merged = Vec::new();
    for (_, bytes) in slots {
        if let Ok(v) = serde_json::from_slice::<Vec<Comment>>(&bytes) {
            merged.extend(v);
        }
    }
    merged
}

/// Append a new comment to the caller's own slot (spec §4.9). `parent`,
/// if present, must itself be top-level — replying to a reply is rejected
/// with `MaxDepthExceeded` since this protocol only models one level of
/// threading.
pub async fn add_comment(
    chunked: &dyn ChunkedLayer,
    topic_uuid: &str,
    author_fp: &str,
    body: &str,
    parent_comment_uuid: Option<&str>,
    mentions: Vec<String>,
    signing_secret_key: &[u8],
) -> Result<Comment> {
    if body.is_empty() || body.chars().count() > BODY_MAX_LEN {
        return Err(DnaError::Validation(format!(
            "comment body must be 1..={BODY_MAX_LEN} chars"
        )));
    }
    if mentions.len() > MENTIONS_MAX {
        return Err(DnaError::Validation(format!(
            "at most {MENTIONS_MAX} mentions allowed"
        )));
    }

    if let Some(parent_uuid) = parent_comment_uuid {
        let all = fetch_all_raw(chunked, topic_uuid).await;
        match all.iter().find(|c| c.comment_uuid == parent_uuid) {
            Some(parent) if parent.parent_comment_uuid.is_empty() => {}
            Some(_) => return Err(DnaError::MaxDepthExceeded),
            None => return Err(DnaError::Validation("parent comment not found".into())),
        }
    }

    let key = comments_key(topic_uuid);
    let mut mine: Vec<Comment> = match chunked.fetch_mine(&key, author_fp).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => Vec::new(),
    };

    let mut comment = Comment {
        version: 1,
        comment_uuid: Uuid::new_v4().to_string(),
        topic_uuid: topic_uuid.to_string(),
        parent_comment_uuid: parent_comment_uuid.unwrap_or_default().to_string(),
        author_fp: author_fp.to_string(),
        body: body.to_string(),
        mentions,
        created_at: now_unix_secs(),
        signature: Vec::new(),
    };
    let unsigned = canonical_bytes(&comment, &["signature"])?;
    comment.signature = sign(&unsigned, signing_secret_key)?;

    mine.push(comment.clone());
    let bytes = serde_json::to_vec(&mine)?;
    chunked.publish(&key, author_fp, bytes, TOPIC_TTL_SECS).await?;

    Ok(comment)
}

/// Fetch and merge every author's comments for `topic_uuid`, newest first.
/// Verification is the caller's responsibility per comment via
/// [`verify_comment`] — this function's job is assembling the thread, not
/// trusting it.
pub async fn get_all_comments(chunked: &dyn ChunkedLayer, topic_uuid: &str) -> Result<Vec<Comment>> {
    let mut merged: Vec<Comment> = fetch_all_raw(chunked, topic_uuid)
        .await
        .into_iter()
        .filter(|c| c.topic_uuid == topic_uuid)
        .collect();
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(merged)
}

pub fn verify_comment(comment: &Comment, signing_public_key: &[u8]) -> Result<bool> {
    let unsigned = canonical_bytes(comment, &["signature"])?;
    Ok(verify(&comment.signature, &unsigned, signing_public_key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_chunked::InMemoryChunkedLayer;
    use dna_crypto::sign_keypair;

    #[tokio::test]
    async fn multi_owner_merge_sorted_newest_first() {
        let chunked = InMemoryChunkedLayer::new();
        let alice = sign_keypair();
        let bob = sign_keypair();

        let c_a1 = add_comment(&chunked, "t1", "alice-fp", "hi", None, vec![], &alice.secret_key)
            .await
            .unwrap();
        let _c_b1 = add_comment(&chunked, "t1", "bob-fp", "hey", None, vec![], &bob.secret_key)
            .await
            .unwrap();
        let c_a2 = add_comment(&chunked, "t1", "alice-fp", "again", None, vec![], &alice.secret_key)
            .await
            .unwrap();

        let all = get_all_comments(&chunked, "t1").await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].comment_uuid, c_a2.comment_uuid);

        let alice_mine = chunked.fetch_mine(&comments_key("t1"), "alice-fp").await.unwrap();
        let alice_comments: Vec<Comment> = serde_json::from_slice(&alice_mine).unwrap();
        assert_eq!(alice_comments, vec![c_a1, c_a2]);
    }

    #[tokio::test]
    async fn reply_to_a_reply_is_rejected() {
        let chunked = InMemoryChunkedLayer::new();
        let alice = sign_keypair();
        let top = add_comment(&chunked, "t1", "alice-fp", "root", None, vec![], &alice.secret_key)
            .await
            .unwrap();
        let reply = add_comment(
            &chunked,
            "t1",
            "alice-fp",
            "reply",
            Some(&top.comment_uuid),
            vec![],
            &alice.secret_key,
        )
        .await
        .unwrap();
        let err = add_comment(
            &chunked,
            "t1",
            "alice-fp",
            "reply-to-reply",
            Some(&reply.comment_uuid),
            vec![],
            &alice.secret_key,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DnaError::MaxDepthExceeded));
    }
}
