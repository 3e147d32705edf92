//! Feed day-bucket indexes (spec §3, §4.8): compact projections of topics,
//! keyed per category and globally, paginated by `YYYYMMDD`.

use chrono::DateTime;
use serde::{Deserialize, Serialize};

use dna_chunked::ChunkedLayer;

use crate::codec::dht_key;
use crate::error::Result;
use crate::feed::topic::{Topic, TOPIC_TTL_SECS};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexEntry {
    pub topic_uuid: String,
    pub author_fp: String,
    pub title: String,
    pub category_id: String,
    pub created_at: u64,
    pub deleted: bool,
}

impl From<&Topic> for IndexEntry {
    fn from(topic: &Topic) -> Self {
        IndexEntry {
            topic_uuid: topic.topic_uuid.clone(),
            author_fp: topic.author_fp.clone(),
            title: topic.title.clone(),
            category_id: topic.category_id.clone(),
            created_at: topic.created_at,
            deleted: topic.deleted,
        }
    }
}

/// `YYYYMMDD` bucket for a unix-seconds timestamp.
pub fn day_bucket(unix_secs: u64) -> String {
    DateTime::from_timestamp(unix_secs as i64, 0)
        .map(|dt| dt.format("%Y%m%d").to_string())
        .unwrap_or_else(|| "19700101".to_string())
}

pub fn category_index_key(category_id: &str, date: &str) -> String {
    dht_key(&format!("dna:feeds:idx:cat:{category_id}:{date}"))
}

pub fn global_index_key(date: &str) -> String {
    dht_key(&format!("dna:feeds:idx:all:{date}"))
}

/// Upsert `topic`'s entry into both its category and global buckets for
/// `date`. Each author owns one slot per bucket holding an array of their
/// own entries — publishing replaces only that slot (spec §4.5's
/// multi-owner contract).
pub async fn publish_index_entries(chunked: &dyn ChunkedLayer, topic: &Topic, date: &str) -> Result<()> {
    upsert_bucket(chunked, &category_index_key(&topic.category_id, date), topic).await?;
    upsert_bucket(chunked, &global_index_key(date), topic).await?;
    Ok(())
}

async fn upsert_bucket(chunked: &dyn ChunkedLayer, key: &str, topic: &Topic) -> Result<()> {
    let mut entries: Vec<IndexEntry> = match chunked.fetch_mine(key, &topic.author_fp).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    match entries.iter_mut().find(|e| e.topic_uuid == topic.topic_uuid) {
        Some(existing) => *existing = IndexEntry::from(topic),
        None => entries.push(IndexEntry::from(topic)),
    }
    let bytes = serde_json::to_vec(&entries)?;
    chunked.publish(key, &topic.author_fp, bytes, TOPIC_TTL_SECS).await?;
    Ok(())
}

/// Merge every author's slot under `key`. A parse failure in one author's
/// slot is skipped, not propagated (best-effort, mirrors the comment
/// merge discipline in spec §4.9).
async fn fetch_bucket(chunked: &dyn ChunkedLayer, key: &str) -> Result<Vec<IndexEntry>> {
    let slots = match chunked.fetch_all(key).await {
        Ok(s) => s,
        Err(_) => return Ok(Vec::new()),
    };
    let mut merged = Vec::new();
    for (_, bytes) in slots {
        if let Ok(entries) = serde_json::from_slice::<Vec<IndexEntry>>(&bytes) {
            merged.extend(entries);
        }
    }
    Ok(merged)
}

pub async fn fetch_category_index(chunked: &dyn ChunkedLayer, category_id: &str, date: &str) -> Result<Vec<IndexEntry>> {
    fetch_bucket(chunked, &category_index_key(category_id, date)).await
}

pub async fn fetch_global_index(chunked: &dyn ChunkedLayer, date: &str) -> Result<Vec<IndexEntry>> {
    fetch_bucket(chunked, &global_index_key(date)).await
}
