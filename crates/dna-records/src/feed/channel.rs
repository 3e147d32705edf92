//! Channels (v1) / categories (v2) and the channel registry (spec §3).

use serde::{Deserialize, Serialize};

use dna_chunked::ChunkedLayer;
use dna_crypto::{now_unix_secs, sha256, to_hex};

use crate::codec::dht_key;
use crate::error::Result;

pub const REGISTRY_TTL_SECS: u64 = 30 * 86_400;
pub const STALE_AFTER_SECS: u64 = 900;

/// `channel_id = sha256(lowercase_name)`, 64 hex chars.
pub fn channel_id_of(name: &str) -> String {
    to_hex(&sha256(name.to_lowercase().as_bytes()))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Channel {
    pub channel_id: String,
    pub name: String,
    pub description: String,
    pub creator_fp: String,
    pub created_at: u64,
    pub topic_count: u64,
    pub member_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct RegistryEntry {
    channel: Channel,
    last_seen: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
struct ChannelRegistry {
    channels: Vec<RegistryEntry>,
}

pub fn registry_key() -> String {
    dht_key("dna:feeds:channels:registry")
}

async fn fetch_registry(chunked: &dyn ChunkedLayer) -> Result<ChannelRegistry> {
    match chunked.fetch(&registry_key()).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(_) => Ok(ChannelRegistry::default()),
    }
}

/// Upsert `channel` into the registry, refreshing its `last_seen`.
pub async fn publish_channel(chunked: &dyn ChunkedLayer, channel: Channel, publisher_fp: &str) -> Result<()> {
    let mut registry = fetch_registry(chunked).await?;
    let now = now_unix_secs();
    match registry
        .channels
        .iter_mut()
        .find(|e| e.channel.channel_id == channel.channel_id)
    {
        Some(existing) => {
            existing.channel = channel;
            existing.last_seen = now;
        }
        None => registry.channels.push(RegistryEntry { channel, last_seen: now }),
    }
    let bytes = serde_json::to_vec(&registry)?;
    chunked.publish(&registry_key(), publisher_fp, bytes, REGISTRY_TTL_SECS).await?;
    Ok(())
}

/// Live channels: rows stale by more than 900s are filtered at read time
/// (spec §3, §6), mirroring the bootstrap registry's own staleness rule.
pub async fn fetch_live_channels(chunked: &dyn ChunkedLayer) -> Result<Vec<Channel>> {
    let registry = fetch_registry(chunked).await?;
    let now = now_unix_secs();
    Ok(registry
        .channels
        .into_iter()
        .filter(|e| now.saturating_sub(e.last_seen) <= STALE_AFTER_SECS)
        .map(|e| e.channel)
        .collect())
}
