//! Chunked value substrate (C6): external contract per spec §4.5.
//!
//! The chunked layer's own chunk indexing, compression, and per-chunk
//! signing are explicitly out of scope (spec §1) — this crate specifies
//! only the contract every record codec in `dna-records` publishes and
//! fetches through: a multi-owner, TTL'd key/value surface where
//! `publish()` touches only the caller's slot and reads can target one
//! slot (`fetch_mine`) or merge across all authors (`fetch_all`).
//!
//! `InMemoryChunkedLayer` is the reference implementation used by tests
//! and as the default local backend for `dna-engine`; it is not the
//! production chunked layer (that lives behind the DHT session and is
//! someone else's subsystem), but it honors the same contract so the
//! rest of this workspace never has to special-case "am I talking to the
//! real chunked layer or a stub".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors the chunked layer's external contract must keep distinguishable
/// (spec §4.5, §7): a framing problem is not the same as "not there yet".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkedError {
    #[error("key not found or expired")]
    NotFound,
    #[error("chunk framing error: {0}")]
    Framing(String),
}

pub type ChunkedResult<T> = std::result::Result<T, ChunkedError>;

#[derive(Clone, Debug)]
struct Slot {
    bytes: Vec<u8>,
    expires_at: u64,
    tombstoned: bool,
}

/// The chunked layer's external contract (spec §4.5).
#[async_trait]
pub trait ChunkedLayer: Send + Sync {
    /// Publish `bytes` under `key`, touching only `owner_fp`'s slot.
    /// `ttl_secs` is relative to the moment of the call.
    async fn publish(
        &self,
        key: &str,
        owner_fp: &str,
        bytes: Vec<u8>,
        ttl_secs: u64,
    ) -> ChunkedResult<()>;

    /// Fetch a single-owner key. Sugar over `fetch_all` for keys where the
    /// namespace guarantees exactly one writer (identity backups, group and
    /// contact lists); returns `NotFound` if no live slot exists.
    async fn fetch(&self, key: &str) -> ChunkedResult<Vec<u8>>;

    /// Fetch only the caller's own slot under `key` (spec §4.5, §4.9).
    async fn fetch_mine(&self, key: &str, owner_fp: &str) -> ChunkedResult<Vec<u8>>;

    /// Fetch every author's slot under `key`, merging at read time.
    /// Order is unspecified; callers that need a stable order sort.
    async fn fetch_all(&self, key: &str) -> ChunkedResult<Vec<(String, Vec<u8>)>>;

    /// Overwrite the caller's slot with an empty tombstone. Best-effort:
    /// full disappearance only happens at TTL (spec §4.5).
    async fn delete(&self, key: &str, owner_fp: &str) -> ChunkedResult<()>;
}

/// In-memory reference implementation of [`ChunkedLayer`].
#[derive(Clone, Default)]
pub struct InMemoryChunkedLayer {
    // key -> owner_fp -> slot
    store: Arc<RwLock<HashMap<String, HashMap<String, Slot>>>>,
    now_fn: Option<Arc<dyn Fn() -> u64 + Send + Sync>>,
}

impl InMemoryChunkedLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the clock, for deterministic TTL-expiry tests.
    pub fn with_clock(clock: Arc<dyn Fn() -> u64 + Send + Sync>) -> Self {
        Self {
            store: Arc::new(RwLock::new(HashMap::new())),
            now_fn: Some(clock),
        }
    }

    fn now(&self) -> u64 {
        match &self.now_fn {
            Some(f) => f(),
            None => dna_crypto_time_now(),
        }
    }
}

fn dna_crypto_time_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[async_trait]
impl ChunkedLayer for InMemoryChunkedLayer {
    async fn publish(
        &self,
        key: &str,
        owner_fp: &str,
        bytes: Vec<u8>,
        ttl_secs: u64,
    ) -> ChunkedResult<()> {
        let expires_at = self.now() + ttl_secs;
        let mut store = self.store.write().await;
        let slots = store.entry(key.to_string()).or_default();
        slots.insert(
            owner_fp.to_string(),
            Slot {
                bytes,
                expires_at,
                tombstoned: false,
            },
        );
        Ok(())
    }

    async fn fetch(&self, key: &str) -> ChunkedResult<Vec<u8>> {
        let all = self.fetch_all(key).await?;
        all.into_iter()
            .next()
            .map(|(_, bytes)| bytes)
            .ok_or(ChunkedError::NotFound)
    }

    async fn fetch_mine(&self, key: &str, owner_fp: &str) -> ChunkedResult<Vec<u8>> {
        let now = self.now();
        let store = self.store.read().await;
        let slot = store
            .get(key)
            .and_then(|slots| slots.get(owner_fp))
            .filter(|s| s.expires_at > now && !s.tombstoned)
            .ok_or(ChunkedError::NotFound)?;
        Ok(slot.bytes.clone())
    }

    async fn fetch_all(&self, key: &str) -> ChunkedResult<Vec<(String, Vec<u8>)>> {
        let now = self.now();
        let store = self.store.read().await;
        let slots = store.get(key).ok_or(ChunkedError::NotFound)?;
        let live: Vec<(String, Vec<u8>)> = slots
            .iter()
            .filter(|(_, s)| s.expires_at > now && !s.tombstoned)
            .map(|(owner, s)| (owner.clone(), s.bytes.clone()))
            .collect();
        if live.is_empty() {
            return Err(ChunkedError::NotFound);
        }
        Ok(live)
    }

    async fn delete(&self, key: &str, owner_fp: &str) -> ChunkedResult<()> {
        let mut store = self.store.write().await;
        if let Some(slots) = store.get_mut(key) {
            if let Some(slot) = slots.get_mut(owner_fp) {
                slot.bytes.clear();
                slot.tombstoned = true;
            }
        }
        Ok(())
    }
}
