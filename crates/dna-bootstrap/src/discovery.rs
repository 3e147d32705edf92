//! Bootstrap discovery (C3): populates the initial peer list from the
//! cache, then runs a cancellable background task that reconciles the
//! cache against the live peer registry (spec §4.3, §5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{BootstrapCache, BootstrapEntry};
use crate::error::Result;
use crate::session::SessionHandle;

/// Invoked with `(connected_count)` once a refresh cycle ends. Stored
/// behind a mutex that protects only the callback pointer (spec §4.3,
/// §5) — the callback body always runs outside the lock, so a slow or
/// reentrant callback can't block a concurrent `set`/`clear`.
pub type CompletionCallback = Arc<Mutex<Option<Arc<dyn Fn(usize) + Send + Sync>>>>;

pub fn new_completion_callback() -> CompletionCallback {
    Arc::new(Mutex::new(None))
}

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Well-known DHT key the peer registry is published under.
    pub registry_key: String,
    pub max_registry_attempts: u32,
    pub registry_retry_delay: Duration,
    pub ready_timeout: Duration,
    /// Registry entries older than this are dropped before reconciliation.
    pub stale_after: Duration,
    pub cache_seed_limit: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            registry_key: "dna:bootstrap:registry".to_string(),
            max_registry_attempts: 3,
            registry_retry_delay: Duration::from_secs(1),
            ready_timeout: Duration::from_secs(10),
            stale_after: Duration::from_secs(15 * 60),
            cache_seed_limit: 20,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RegistryPeer {
    pub ip: String,
    pub port: u16,
    pub node_id: Option<String>,
    pub version: Option<String>,
    pub last_seen: i64,
}

/// A joinable handle for the background discovery task (spec §5, §9): the
/// engine must `join` it, never detach, before freeing the DHT session.
pub struct DiscoveryHandle {
    running: Arc<AtomicBool>,
    task: tokio::task::JoinHandle<()>,
}

impl DiscoveryHandle {
    /// Cooperative cancellation: the task finishes bookkeeping for the
    /// peer it's currently processing, then exits at the next loop head.
    pub fn cancel(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for the task to actually terminate.
    pub async fn join(self) {
        if let Err(err) = self.task.await {
            warn!(?err, "discovery task panicked");
        }
    }
}

pub struct BootstrapDiscovery {
    cache: Arc<BootstrapCache>,
    config: DiscoveryConfig,
}

impl BootstrapDiscovery {
    pub fn new(cache: Arc<BootstrapCache>, config: DiscoveryConfig) -> Self {
        Self { cache, config }
    }

    /// Cache-seed mode (spec §4.3.1): up to `cache_seed_limit` best
    /// entries, skipping unreliable ones. `BootstrapCache::best` already
    /// applies the reliability filter.
    pub fn from_cache(&self) -> Result<Vec<BootstrapEntry>> {
        self.cache.best(self.config.cache_seed_limit)
    }

    /// Spawn the registry-refresh background task (spec §4.3.2). The
    /// returned handle must be joined before the caller drops `session`.
    pub fn spawn_refresh(
        &self,
        session: SessionHandle,
        now: impl Fn() -> i64 + Send + Sync + 'static,
        on_complete: CompletionCallback,
    ) -> DiscoveryHandle {
        let running = Arc::new(AtomicBool::new(true));
        let task_running = running.clone();
        let cache = self.cache.clone();
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            run_refresh(cache, config, session, task_running, now, on_complete).await;
        });

        DiscoveryHandle { running, task }
    }
}

async fn run_refresh(
    cache: Arc<BootstrapCache>,
    config: DiscoveryConfig,
    session: SessionHandle,
    running: Arc<AtomicBool>,
    now: impl Fn() -> i64,
    on_complete: CompletionCallback,
) {
    let Some(dht) = session.upgrade() else {
        warn!("discovery: session handle already gone at task start");
        return;
    };

    if !dht.wait_for_ready(config.ready_timeout.as_millis() as u64).await {
        warn!("discovery: DHT session never became ready");
        invoke_completion(&on_complete, 0);
        return;
    }

    let mut registry_bytes = None;
    for attempt in 1..=config.max_registry_attempts {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        if let Some(bytes) = dht.get(&config.registry_key).await {
            registry_bytes = Some(bytes);
            break;
        }
        debug!(attempt, "discovery: registry fetch miss, retrying");
        tokio::time::sleep(config.registry_retry_delay).await;
    }

    let Some(bytes) = registry_bytes else {
        warn!("discovery: registry unreachable after retries");
        invoke_completion(&on_complete, 0);
        return;
    };

    let peers: Vec<RegistryPeer> = match serde_json::from_slice(&bytes) {
        Ok(p) => p,
        Err(err) => {
            warn!(%err, "discovery: malformed registry payload");
            invoke_completion(&on_complete, 0);
            return;
        }
    };

    let cutoff = now() - config.stale_after.as_secs() as i64;
    let mut connected = 0usize;

    for peer in peers {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        if peer.last_seen < cutoff {
            continue;
        }

        if let Err(err) = cache.put(
            &peer.ip,
            peer.port,
            peer.node_id.as_deref(),
            peer.version.as_deref(),
            peer.last_seen,
        ) {
            warn!(%err, ip = %peer.ip, port = peer.port, "discovery: cache put failed");
            continue;
        }

        match dht.bootstrap_runtime(&peer.ip, peer.port).await {
            Ok(_) => {
                let _ = cache.mark_connected(&peer.ip, peer.port, now());
                connected += 1;
                info!(ip = %peer.ip, port = peer.port, "discovery: connected");
            }
            Err(err) => {
                let _ = cache.mark_failed(&peer.ip, peer.port);
                debug!(%err, ip = %peer.ip, port = peer.port, "discovery: connect failed");
            }
        }
    }

    invoke_completion(&on_complete, connected);
}

fn invoke_completion(callback: &CompletionCallback, connected_count: usize) {
    // Clone the Arc out from under the lock so the callback body runs
    // without holding it (spec §4.3, §5): a slow or reentrant callback
    // can never block a concurrent set/clear of the callback pointer.
    let maybe_f = callback.lock().clone();
    if let Some(f) = maybe_f {
        f(connected_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{DhtSession, SessionStatus};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct FakeSession {
        registry: Vec<u8>,
        fail_ips: Vec<String>,
    }

    #[async_trait]
    impl DhtSession for FakeSession {
        async fn bootstrap_runtime(&self, ip: &str, _port: u16) -> Result<SessionStatus> {
            if self.fail_ips.iter().any(|f| f == ip) {
                Err(crate::error::BootstrapError::TransientNetwork(
                    "refused".into(),
                ))
            } else {
                Ok(SessionStatus::Ready)
            }
        }
        async fn wait_for_ready(&self, _timeout_ms: u64) -> bool {
            true
        }
        async fn get(&self, _key: &str) -> Option<Vec<u8>> {
            Some(self.registry.clone())
        }
        async fn put(&self, _key: &str, _value: Vec<u8>, _ttl_secs: u64) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn refresh_connects_live_peers_and_skips_stale() {
        let cache = Arc::new(BootstrapCache::open_in_memory().unwrap());
        let now_fixed = 10_000i64;
        let peers = vec![
            RegistryPeer {
                ip: "1.2.3.4".into(),
                port: 9001,
                node_id: None,
                version: None,
                last_seen: now_fixed - 10,
            },
            RegistryPeer {
                ip: "5.6.7.8".into(),
                port: 9002,
                node_id: None,
                version: None,
                last_seen: now_fixed - 2000, // stale, > 15 min
            },
            RegistryPeer {
                ip: "9.9.9.9".into(),
                port: 9003,
                node_id: None,
                version: None,
                last_seen: now_fixed - 10,
            },
        ];
        let registry = serde_json::to_vec(&peers).unwrap();
        let session = SessionHandle::owned(Arc::new(FakeSession {
            registry,
            fail_ips: vec!["9.9.9.9".to_string()],
        }));

        let discovery = BootstrapDiscovery::new(cache.clone(), DiscoveryConfig::default());
        let connected_count = Arc::new(AtomicUsize::new(0));
        let cc = connected_count.clone();
        let callback = new_completion_callback();
        *callback.lock() = Some(Arc::new(move |n| {
            cc.store(n, Ordering::SeqCst);
        }));

        let handle = discovery.spawn_refresh(session, move || now_fixed, callback);
        handle.join().await;

        assert_eq!(connected_count.load(Ordering::SeqCst), 1);
        assert!(cache.exists("1.2.3.4", 9001).unwrap());
        assert!(!cache.exists("5.6.7.8", 9002).unwrap());
        assert!(cache.exists("9.9.9.9", 9003).unwrap());
        let all = cache.all().unwrap();
        let failed = all.iter().find(|e| e.ip == "9.9.9.9").unwrap();
        assert_eq!(failed.failures, 1);
    }
}
