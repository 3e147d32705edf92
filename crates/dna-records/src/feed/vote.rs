//! Votes (C9, spec §4.11): permanent, one per `(voter_fp, post_id)`.

use serde::{Deserialize, Serialize};

use dna_chunked::ChunkedLayer;
use dna_crypto::{now_unix_secs, sign, verify};

use crate::codec::dht_key;
use crate::error::{DnaError, Result};

pub const VOTES_TTL_SECS: u64 = 30 * 86_400;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Vote {
    pub voter_fp: String,
    pub vote_value: i8,
    pub timestamp: u64,
    #[serde(default)]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct VoteAggregate {
    pub post_id: String,
    pub upvote_count: u32,
    pub downvote_count: u32,
    pub votes: Vec<Vote>,
}

/// Retained deliberately in the `"dna:feed:post:…"` namespace rather than
/// moving under `"dna:feeds:"` with the rest of the feed subsystem (spec
/// §6, §9 open question — source mixes both namespaces and we follow it).
pub fn votes_key(post_id: &str) -> String {
    dht_key(&format!("dna:feed:post:{post_id}:votes"))
}

fn vote_signed_bytes(post_id: &str, vote_value: i8, timestamp: u64) -> Vec<u8> {
    let mut bytes = post_id.as_bytes().to_vec();
    bytes.push(vote_value as u8);
    bytes.extend_from_slice(&timestamp.to_be_bytes());
    bytes
}

fn recompute_counts(aggregate: &mut VoteAggregate) {
    aggregate.upvote_count = aggregate.votes.iter().filter(|v| v.vote_value == 1).count() as u32;
    aggregate.downvote_count = aggregate.votes.iter().filter(|v| v.vote_value == -1).count() as u32;
}

/// Missing aggregate returns an empty one, not an error (spec §4.11).
pub async fn load_aggregate(chunked: &dyn ChunkedLayer, post_id: &str) -> Result<VoteAggregate> {
    match chunked.fetch(&votes_key(post_id)).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(_) => Ok(VoteAggregate {
            post_id: post_id.to_string(),
            ..Default::default()
        }),
    }
}

/// Cast a vote. A voter who already appears in the aggregate is rejected
/// with `AlreadyVoted` regardless of the new value — votes are permanent.
pub async fn cast_vote(
    chunked: &dyn ChunkedLayer,
    post_id: &str,
    voter_fp: &str,
    vote_value: i8,
    signing_secret_key: &[u8],
) -> Result<VoteAggregate> {
    if vote_value != 1 && vote_value != -1 {
        return Err(DnaError::Validation("vote_value must be +1 or -1".into()));
    }

    let mut aggregate = load_aggregate(chunked, post_id).await?;
    if aggregate.votes.iter().any(|v| v.voter_fp == voter_fp) {
        return Err(DnaError::AlreadyVoted);
    }

    let timestamp = now_unix_secs();
    let signature = sign(&vote_signed_bytes(post_id, vote_value, timestamp), signing_secret_key)?;
    aggregate.votes.push(Vote {
        voter_fp: voter_fp.to_string(),
        vote_value,
        timestamp,
        signature,
    });
    aggregate.post_id = post_id.to_string();
    recompute_counts(&mut aggregate);

    let bytes = serde_json::to_vec(&aggregate)?;
    chunked.publish(&votes_key(post_id), post_id, bytes, VOTES_TTL_SECS).await?;
    Ok(aggregate)
}

/// Load an aggregate and verify every vote's signature and the counter
/// invariant (`upvote_count`/`downvote_count` must equal the tallies of
/// `votes`). Any mismatch is a hard error, never a silent correction
/// (spec §4.11). `signer_lookup` resolves a voter's signing public key —
/// an unresolvable voter is treated as a signature failure.
pub async fn load_and_verify_aggregate(
    chunked: &dyn ChunkedLayer,
    post_id: &str,
    signer_lookup: &dyn Fn(&str) -> Option<Vec<u8>>,
) -> Result<VoteAggregate> {
    let aggregate = load_aggregate(chunked, post_id).await?;
    for vote in &aggregate.votes {
        let public_key = signer_lookup(&vote.voter_fp).ok_or(DnaError::SignatureInvalid)?;
        let bytes = vote_signed_bytes(post_id, vote.vote_value, vote.timestamp);
        if !verify(&vote.signature, &bytes, &public_key)? {
            return Err(DnaError::SignatureInvalid);
        }
    }

    let mut recomputed = aggregate.clone();
    recompute_counts(&mut recomputed);
    if recomputed.upvote_count != aggregate.upvote_count || recomputed.downvote_count != aggregate.downvote_count {
        return Err(DnaError::Validation("vote aggregate counters do not match tallies".into()));
    }
    Ok(aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dna_chunked::InMemoryChunkedLayer;
    use dna_crypto::sign_keypair;
    use std::collections::HashMap;

    #[tokio::test]
    async fn second_vote_from_same_voter_is_rejected() {
        let chunked = InMemoryChunkedLayer::new();
        let kp = sign_keypair();
        cast_vote(&chunked, "post1", "voter-fp", 1, &kp.secret_key).await.unwrap();
        let err = cast_vote(&chunked, "post1", "voter-fp", -1, &kp.secret_key).await.unwrap_err();
        assert!(matches!(err, DnaError::AlreadyVoted));
    }

    #[tokio::test]
    async fn counters_match_tallies() {
        let chunked = InMemoryChunkedLayer::new();
        let mut keys = HashMap::new();
        for (name, value) in [("v1", 1), ("v2", 1), ("v3", 1), ("v4", -1)] {
            let kp = sign_keypair();
            cast_vote(&chunked, "post1", name, value, &kp.secret_key).await.unwrap();
            keys.insert(name.to_string(), kp.public_key);
        }

        let aggregate = load_and_verify_aggregate(&chunked, "post1", &|fp| keys.get(fp).cloned())
            .await
            .unwrap();
        assert_eq!(aggregate.upvote_count, 3);
        assert_eq!(aggregate.downvote_count, 1);
        assert_eq!(aggregate.votes.len(), 4);
    }

    #[tokio::test]
    async fn missing_aggregate_is_empty_not_error() {
        let chunked = InMemoryChunkedLayer::new();
        let aggregate = load_aggregate(&chunked, "never-voted-on").await.unwrap();
        assert_eq!(aggregate.votes.len(), 0);
    }
}
