//! Engine configuration: persisted-state layout (spec §6).

use std::path::PathBuf;

use dna_bootstrap::DiscoveryConfig;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Defaults to `~/.dna`; holds the bootstrap cache DB and per-identity
    /// backup blobs (spec §6).
    pub base_dir: PathBuf,
    pub discovery: DiscoveryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let base_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".dna");
        Self {
            base_dir,
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn bootstrap_cache_path(&self) -> PathBuf {
        self.base_dir.join("bootstrap_cache.db")
    }

    /// `~/.dna/<fp>/db/`, reserved for per-identity sqlite stores (spec §6).
    pub fn identity_db_dir(&self, fingerprint: &str) -> PathBuf {
        self.base_dir.join(fingerprint).join("db")
    }
}
