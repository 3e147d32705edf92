//! The engine facade (spec §9): owns the DHT session handle and the
//! bootstrap cache/discovery lifecycle, replacing the source's global
//! singletons with an object callers hold explicitly.

use std::sync::Arc;

use parking_lot::Mutex;

use dna_bootstrap::{
    BootstrapCache, BootstrapDiscovery, BootstrapEntry, CompletionCallback, DiscoveryHandle,
    SessionHandle,
};
use dna_chunked::ChunkedLayer;

use crate::config::EngineConfig;

/// Owns the chunked layer, the bootstrap cache, and the DHT session
/// handle for one node process. `SessionHandle` already distinguishes
/// owned from borrowed (dna-bootstrap's `session` module); the engine is
/// free to hold either, matching spec §5/§9's "either the singleton owns
/// it, or the engine owns it" split.
pub struct Engine {
    config: EngineConfig,
    cache: Arc<BootstrapCache>,
    discovery: BootstrapDiscovery,
    session: SessionHandle,
    discovery_handle: Mutex<Option<DiscoveryHandle>>,
    chunked: Arc<dyn ChunkedLayer>,
}

impl Engine {
    pub fn new(config: EngineConfig, session: SessionHandle, chunked: Arc<dyn ChunkedLayer>) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.base_dir)?;
        let cache = Arc::new(BootstrapCache::open(config.bootstrap_cache_path())?);
        let discovery = BootstrapDiscovery::new(cache.clone(), config.discovery.clone());
        Ok(Self {
            config,
            cache,
            discovery,
            session,
            discovery_handle: Mutex::new(None),
            chunked,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<BootstrapCache> {
        &self.cache
    }

    pub fn chunked(&self) -> &Arc<dyn ChunkedLayer> {
        &self.chunked
    }

    /// Cache-seed mode (spec §4.3.1): up to the configured limit of best
    /// entries, skipping unreliable ones.
    pub fn seed_from_cache(&self) -> anyhow::Result<Vec<BootstrapEntry>> {
        Ok(self.discovery.from_cache()?)
    }

    /// A read-only, non-owning view onto this engine's session, suitable
    /// for a background task that must never be the one to tear the
    /// session down (spec §5, §9).
    pub fn borrow_session(&self) -> SessionHandle {
        self.session.borrow()
    }

    /// Spawn the registry-refresh background task (spec §4.3.2). Only one
    /// refresh runs at a time: a second call while one is in flight fails
    /// loudly rather than silently orphaning the earlier task.
    pub fn start_discovery(
        &self,
        now: impl Fn() -> i64 + Send + Sync + 'static,
        on_complete: CompletionCallback,
    ) -> anyhow::Result<()> {
        let mut guard = self.discovery_handle.lock();
        if guard.is_some() {
            anyhow::bail!("discovery refresh already running");
        }
        let handle = self.discovery.spawn_refresh(self.borrow_session(), now, on_complete);
        *guard = Some(handle);
        Ok(())
    }

    /// Cooperatively cancel and join the background refresh task. Spec
    /// §5/§9 mandate a joinable handle, never a detached thread — this
    /// must complete before the engine (and its owned session, if any)
    /// can be safely dropped.
    pub async fn stop_discovery(&self) {
        let handle = self.discovery_handle.lock().take();
        if let Some(handle) = handle {
            handle.cancel();
            handle.join().await;
        }
    }

    pub fn is_discovery_running(&self) -> bool {
        self.discovery_handle.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use dna_bootstrap::discovery::new_completion_callback;
    use dna_bootstrap::error::Result as BootstrapResult;
    use dna_bootstrap::{DhtSession, SessionStatus};
    use dna_chunked::InMemoryChunkedLayer;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::tempdir;

    struct NullSession {
        ready: AtomicBool,
    }

    #[async_trait]
    impl DhtSession for NullSession {
        async fn bootstrap_runtime(&self, _ip: &str, _port: u16) -> BootstrapResult<SessionStatus> {
            Ok(SessionStatus::Ready)
        }
        async fn wait_for_ready(&self, _timeout_ms: u64) -> bool {
            self.ready.load(Ordering::SeqCst)
        }
        async fn get(&self, _key: &str) -> Option<Vec<u8>> {
            None
        }
        async fn put(&self, _key: &str, _value: Vec<u8>, _ttl_secs: u64) -> BootstrapResult<()> {
            Ok(())
        }
    }

    fn test_engine(dir: &std::path::Path) -> Engine {
        let config = EngineConfig {
            base_dir: dir.to_path_buf(),
            discovery: Default::default(),
        };
        let session = SessionHandle::owned(Arc::new(NullSession {
            ready: AtomicBool::new(false),
        }));
        let chunked: Arc<dyn ChunkedLayer> = Arc::new(InMemoryChunkedLayer::new());
        Engine::new(config, session, chunked).unwrap()
    }

    #[tokio::test]
    async fn discovery_refuses_double_start_and_joins_on_stop() {
        let dir = tempdir().unwrap();
        let engine = test_engine(dir.path());
        let callback = new_completion_callback();

        engine.start_discovery(|| 0, callback.clone()).unwrap();
        assert!(engine.is_discovery_running());
        assert!(engine.start_discovery(|| 0, callback.clone()).is_err());

        engine.stop_discovery().await;
        assert!(!engine.is_discovery_running());
    }

    #[test]
    fn cache_db_created_under_base_dir() {
        let dir = tempdir().unwrap();
        let engine = test_engine(dir.path());
        assert!(engine.config().bootstrap_cache_path().exists());
        assert_eq!(engine.cache().count().unwrap(), 0);
    }
}
