//! Wall posts with threading (C9, spec §4.10).

use serde::{Deserialize, Serialize};

use dna_chunked::ChunkedLayer;
use dna_crypto::{now_unix_ms, random_bytes, sign, to_hex, verify};

use crate::codec::dht_key;
use crate::error::{DnaError, Result};

pub const TEXT_MAX_LEN: usize = 1_024;
pub const MAX_REPLY_DEPTH: u8 = 2;
pub const ROTATION_LIMIT: usize = 100;
pub const WALL_TTL_SECS: u64 = 30 * 86_400;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WallMessage {
    pub post_id: String,
    pub wall_owner_fp: String,
    pub poster_fp: String,
    pub text: String,
    pub timestamp: u64,
    pub reply_to: Option<String>,
    pub reply_depth: u8,
    #[serde(default)]
    pub signature: Vec<u8>,
}

/// A message plus its reply count, derived at fetch time by scanning —
/// never stored authoritatively (spec §4.10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallMessageView {
    pub message: WallMessage,
    pub reply_count: usize,
}

pub fn wall_key(wall_owner_fp: &str, poster_fp: &str) -> String {
    dht_key(&format!("dna:wall:{wall_owner_fp}:{poster_fp}"))
}

/// `post_id` is `"<poster_fp>_<unix_ms>[_<suffix>]"`; fingerprints are a
/// fixed 128 lowercase hex chars (spec §6), so splitting on that fixed
/// width to recover the poster of a `reply_to` id is unambiguous.
fn poster_fp_from_post_id(post_id: &str) -> Option<&str> {
    if post_id.len() > 128 && post_id.as_bytes().get(128) == Some(&b'_') {
        Some(&post_id[..128])
    } else {
        None
    }
}

fn signed_bytes(text: &str, timestamp: u64) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.extend_from_slice(&timestamp.to_be_bytes());
    bytes
}

async fn load_poster_messages(chunked: &dyn ChunkedLayer, wall_owner_fp: &str, poster_fp: &str) -> Vec<WallMessage> {
    let key = wall_key(wall_owner_fp, poster_fp);
    match chunked.fetch_mine(&key, poster_fp).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

/// Post a message, optionally replying to `reply_to`. The parent may live
/// under a different poster's key on the same wall, so its owner is
/// recovered from the reply id itself before the depth check.
pub async fn post_message(
    chunked: &dyn ChunkedLayer,
    wall_owner_fp: &str,
    poster_fp: &str,
    text: &str,
    reply_to: Option<&str>,
    signing_secret_key: &[u8],
) -> Result<WallMessage> {
    if text.is_empty() || text.chars().count() > TEXT_MAX_LEN {
        return Err(DnaError::Validation(format!(
            "wall text must be 1..={TEXT_MAX_LEN} chars"
        )));
    }

    let reply_depth = match reply_to {
        None => 0,
        Some(parent_id) => {
            let parent_poster = poster_fp_from_post_id(parent_id)
                .ok_or_else(|| DnaError::Validation("malformed reply_to post id".into()))?;
            let parent_messages = load_poster_messages(chunked, wall_owner_fp, parent_poster).await;
            let parent = parent_messages
                .iter()
                .find(|m| m.post_id == parent_id)
                .ok_or_else(|| DnaError::Validation("parent post not found".into()))?;
            let depth = parent.reply_depth + 1;
            if depth > MAX_REPLY_DEPTH {
                return Err(DnaError::MaxDepthExceeded);
            }
            depth
        }
    };

    let timestamp = now_unix_ms();
    let mut messages = load_poster_messages(chunked, wall_owner_fp, poster_fp).await;
    let mut post_id = format!("{poster_fp}_{timestamp}");
    if messages.iter().any(|m| m.post_id == post_id) {
        post_id = format!("{poster_fp}_{timestamp}_{}", to_hex(&random_bytes(4)));
    }

    let mut message = WallMessage {
        post_id,
        wall_owner_fp: wall_owner_fp.to_string(),
        poster_fp: poster_fp.to_string(),
        text: text.to_string(),
        timestamp,
        reply_to: reply_to.map(str::to_string),
        reply_depth,
        signature: Vec::new(),
    };
    message.signature = sign(&signed_bytes(&message.text, message.timestamp), signing_secret_key)?;

    messages.push(message.clone());
    if messages.len() > ROTATION_LIMIT {
        let excess = messages.len() - ROTATION_LIMIT;
        messages.drain(0..excess);
    }
    let bytes = serde_json::to_vec(&messages)?;
    chunked
        .publish(&wall_key(wall_owner_fp, poster_fp), poster_fp, bytes, WALL_TTL_SECS)
        .await?;

    Ok(message)
}

pub fn verify_message(message: &WallMessage, signing_public_key: &[u8]) -> Result<bool> {
    Ok(verify(
        &message.signature,
        &signed_bytes(&message.text, message.timestamp),
        signing_public_key,
    )?)
}

/// One poster's messages on `wall_owner_fp`'s wall, each annotated with a
/// reply count derived by scanning that same bucket. A reply authored by
/// a different poster is counted only when this function is also called
/// for that poster's own bucket — there is no wall-wide index in this
/// protocol to aggregate across posters in one call.
pub async fn get_messages(chunked: &dyn ChunkedLayer, wall_owner_fp: &str, poster_fp: &str) -> Result<Vec<WallMessageView>> {
    let messages = load_poster_messages(chunked, wall_owner_fp, poster_fp).await;
    Ok(messages
        .iter()
        .map(|m| {
            let reply_count = messages
                .iter()
                .filter(|other| other.reply_to.as_deref() == Some(m.post_id.as_str()))
                .count();
            WallMessageView {
                message: m.clone(),
                reply_count,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_chunked::InMemoryChunkedLayer;
    use dna_crypto::sign_keypair;

    /// Production fingerprints are 128 lowercase hex chars (spec §6);
    /// `poster_fp_from_post_id` relies on that fixed width, so tests that
    /// exercise `reply_to` must use real-width fingerprints too.
    fn fp(tag: char) -> String {
        tag.to_string().repeat(128)
    }

    #[tokio::test]
    async fn depth_zero_one_two_then_rejected() {
        let chunked = InMemoryChunkedLayer::new();
        let kp = sign_keypair();
        let owner = fp('0');
        let alice = fp('a');
        let root = post_message(&chunked, &owner, &alice, "root", None, &kp.secret_key)
            .await
            .unwrap();
        assert_eq!(root.reply_depth, 0);

        let d1 = post_message(&chunked, &owner, &alice, "d1", Some(&root.post_id), &kp.secret_key)
            .await
            .unwrap();
        assert_eq!(d1.reply_depth, 1);

        let d2 = post_message(&chunked, &owner, &alice, "d2", Some(&d1.post_id), &kp.secret_key)
            .await
            .unwrap();
        assert_eq!(d2.reply_depth, 2);

        let err = post_message(&chunked, &owner, &alice, "d3", Some(&d2.post_id), &kp.secret_key)
            .await
            .unwrap_err();
        assert!(matches!(err, DnaError::MaxDepthExceeded));
    }

    #[tokio::test]
    async fn reply_count_is_derived() {
        let chunked = InMemoryChunkedLayer::new();
        let kp = sign_keypair();
        let owner = fp('0');
        let alice = fp('a');
        let root = post_message(&chunked, &owner, &alice, "root", None, &kp.secret_key)
            .await
            .unwrap();
        post_message(&chunked, &owner, &alice, "r1", Some(&root.post_id), &kp.secret_key)
            .await
            .unwrap();
        post_message(&chunked, &owner, &alice, "r2", Some(&root.post_id), &kp.secret_key)
            .await
            .unwrap();

        let views = get_messages(&chunked, &owner, &alice).await.unwrap();
        let root_view = views.iter().find(|v| v.message.post_id == root.post_id).unwrap();
        assert_eq!(root_view.reply_count, 2);
    }

    #[tokio::test]
    async fn rotation_keeps_latest_100() {
        let chunked = InMemoryChunkedLayer::new();
        let kp = sign_keypair();
        let owner = fp('0');
        let alice = fp('a');
        for i in 0..105 {
            post_message(&chunked, &owner, &alice, &format!("msg-{i}"), None, &kp.secret_key)
                .await
                .unwrap();
        }
        let views = get_messages(&chunked, &owner, &alice).await.unwrap();
        assert_eq!(views.len(), ROTATION_LIMIT);
        assert_eq!(views[0].message.text, "msg-5");
    }
}
