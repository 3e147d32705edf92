//! Bootstrap cache (C2): a persistent `(ip, port)`-keyed table of peers with
//! reliability scoring, backed by an embedded SQL database at
//! `~/.dna/bootstrap_cache.db` (spec §4.2, §6).
//!
//! Grounded on the reference workspace's `lib-storage/src/dht/peer_registry.rs`
//! reliability-scoring idiom (failed-attempt counters, eviction thresholds),
//! reimplemented here on a row-per-peer SQL table rather than an in-memory
//! `HashMap` because the cache must outlive the process (spec §4.2: "backing
//! store: embedded SQL database at a platform-specific default path").

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::error::Result;

/// One row of the `nodes` table (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapEntry {
    pub ip: String,
    pub port: u16,
    pub node_id: Option<String>,
    pub version: Option<String>,
    pub last_seen: i64,
    pub last_connected: i64,
    pub attempts: u32,
    pub failures: u32,
}

impl BootstrapEntry {
    /// A node with `attempts >= 4` and a failure ratio `> 50%` is
    /// unreliable and excluded from `best()` selection (spec §3).
    pub fn is_unreliable(&self) -> bool {
        self.attempts >= 4 && (self.failures as f64) / (self.attempts as f64) > 0.5
    }
}

/// Persistent, SQL-backed bootstrap peer cache.
pub struct BootstrapCache {
    conn: Arc<Mutex<Connection>>,
}

impl BootstrapCache {
    /// Open (creating if absent) the cache database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// An in-memory cache, for tests that don't need on-disk persistence.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS nodes (
                ip              TEXT NOT NULL,
                port            INTEGER NOT NULL,
                node_id         TEXT,
                version         TEXT,
                last_seen       INTEGER NOT NULL DEFAULT 0,
                last_connected  INTEGER NOT NULL DEFAULT 0,
                attempts        INTEGER NOT NULL DEFAULT 0,
                failures        INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (ip, port)
            );",
        )?;
        Ok(())
    }

    /// Upsert a peer. Insertion preserves existing counters; only
    /// `last_seen`, `node_id`, and `version` are updated on conflict
    /// (spec §4.2).
    pub fn put(
        &self,
        ip: &str,
        port: u16,
        node_id: Option<&str>,
        version: Option<&str>,
        last_seen: i64,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO nodes (ip, port, node_id, version, last_seen, last_connected, attempts, failures)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, 0, 0)
             ON CONFLICT(ip, port) DO UPDATE SET
                node_id = excluded.node_id,
                version = excluded.version,
                last_seen = excluded.last_seen",
            params![ip, port, node_id, version, last_seen],
        )?;
        debug!(ip, port, "bootstrap cache: put");
        Ok(())
    }

    /// Record a successful connect: `attempts += 1`, `failures` reset to 0,
    /// `last_connected = now` (spec §4.2). Resetting `failures` is what
    /// lets a previously-unreliable node re-enter `best()` selection.
    pub fn mark_connected(&self, ip: &str, port: u16, now: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE nodes SET attempts = attempts + 1, failures = 0, last_connected = ?3
             WHERE ip = ?1 AND port = ?2",
            params![ip, port, now],
        )?;
        info!(ip, port, "bootstrap cache: connected");
        Ok(())
    }

    /// Record a failed connect attempt: `attempts += 1`, `failures += 1`.
    pub fn mark_failed(&self, ip: &str, port: u16) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE nodes SET attempts = attempts + 1, failures = failures + 1
             WHERE ip = ?1 AND port = ?2",
            params![ip, port],
        )?;
        debug!(ip, port, "bootstrap cache: failed connect");
        Ok(())
    }

    /// Return up to `limit` best peers, ordered `(failures ASC,
    /// last_connected DESC)`, excluding unreliable nodes (spec §3, §8).
    pub fn best(&self, limit: usize) -> Result<Vec<BootstrapEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT ip, port, node_id, version, last_seen, last_connected, attempts, failures
             FROM nodes
             ORDER BY failures ASC, last_connected DESC",
        )?;
        let rows = stmt.query_map([], Self::row_to_entry)?;
        let mut out = Vec::new();
        for row in rows {
            let entry = row?;
            if entry.is_unreliable() {
                continue;
            }
            out.push(entry);
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    /// Every row, unreliable or not, ordered by primary key.
    pub fn all(&self) -> Result<Vec<BootstrapEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT ip, port, node_id, version, last_seen, last_connected, attempts, failures
             FROM nodes ORDER BY ip, port",
        )?;
        let rows = stmt.query_map([], Self::row_to_entry)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete rows whose `last_seen` is older than `max_age_secs` relative
    /// to `now`.
    pub fn expire(&self, now: i64, max_age_secs: i64) -> Result<usize> {
        let conn = self.conn.lock();
        let cutoff = now - max_age_secs;
        let n = conn.execute("DELETE FROM nodes WHERE last_seen < ?1", params![cutoff])?;
        Ok(n)
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM nodes", [], |r| r.get(0))?;
        Ok(n as usize)
    }

    pub fn exists(&self, ip: &str, port: u16) -> Result<bool> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM nodes WHERE ip = ?1 AND port = ?2",
            params![ip, port],
            |r| r.get(0),
        )?;
        Ok(n > 0)
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<BootstrapEntry> {
        Ok(BootstrapEntry {
            ip: row.get(0)?,
            port: row.get::<_, i64>(1)? as u16,
            node_id: row.get(2)?,
            version: row.get(3)?,
            last_seen: row.get(4)?,
            last_connected: row.get(5)?,
            attempts: row.get::<_, i64>(6)? as u32,
            failures: row.get::<_, i64>(7)? as u32,
        })
    }
}
