//! DHT session (C4): external collaborator. This crate specifies only the
//! trait contract (spec §4.12) and the borrowed-vs-owned handle that
//! prevents the double-free/double-stop hazard called out in spec §5, §9.

use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Connecting,
    Ready,
    Failed,
}

/// The minimal key-value interface the DHT network exposes above its own
/// routing/transport (spec §1, §4.12). Implemented by the real DHT engine;
/// `dna-bootstrap`/`dna-engine` only ever see this trait.
#[async_trait]
pub trait DhtSession: Send + Sync {
    async fn bootstrap_runtime(&self, ip: &str, port: u16) -> Result<SessionStatus>;
    async fn wait_for_ready(&self, timeout_ms: u64) -> bool;
    async fn get(&self, key: &str) -> Option<Vec<u8>>;
    async fn put(&self, key: &str, value: Vec<u8>, ttl_secs: u64) -> Result<()>;
}

/// Explicit ownership of a `DhtSession`, per spec §5/§9: "either the
/// singleton owns it, or the engine owns it and installs a borrowed
/// pointer into the singleton for read-only reuse". A flag — here, the
/// enum variant itself — prevents double-free: only the `Owned` holder's
/// `Drop` can tear the session down, and a `Borrowed` handle whose target
/// has already been dropped simply stops resolving.
#[derive(Clone)]
pub enum SessionHandle {
    Owned(Arc<dyn DhtSession>),
    Borrowed(Weak<dyn DhtSession>),
}

impl SessionHandle {
    pub fn owned(session: Arc<dyn DhtSession>) -> Self {
        SessionHandle::Owned(session)
    }

    /// Install a read-only, non-owning view onto an owned session, the
    /// "borrowed pointer into the singleton" pattern from spec §9.
    pub fn borrow(&self) -> SessionHandle {
        match self {
            SessionHandle::Owned(arc) => SessionHandle::Borrowed(Arc::downgrade(arc)),
            SessionHandle::Borrowed(weak) => SessionHandle::Borrowed(weak.clone()),
        }
    }

    /// Resolve to a live session, or `None` if a borrowed handle's owner
    /// has already been dropped.
    pub fn upgrade(&self) -> Option<Arc<dyn DhtSession>> {
        match self {
            SessionHandle::Owned(arc) => Some(arc.clone()),
            SessionHandle::Borrowed(weak) => weak.upgrade(),
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, SessionHandle::Owned(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct NullSession {
        ready: AtomicBool,
    }

    #[async_trait]
    impl DhtSession for NullSession {
        async fn bootstrap_runtime(&self, _ip: &str, _port: u16) -> Result<SessionStatus> {
            self.ready.store(true, Ordering::SeqCst);
            Ok(SessionStatus::Ready)
        }
        async fn wait_for_ready(&self, _timeout_ms: u64) -> bool {
            self.ready.load(Ordering::SeqCst)
        }
        async fn get(&self, _key: &str) -> Option<Vec<u8>> {
            None
        }
        async fn put(&self, _key: &str, _value: Vec<u8>, _ttl_secs: u64) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn borrowed_handle_dies_with_owner() {
        let owned = SessionHandle::owned(Arc::new(NullSession {
            ready: AtomicBool::new(false),
        }));
        let borrowed = owned.borrow();
        assert!(borrowed.upgrade().is_some());
        drop(owned);
        assert!(borrowed.upgrade().is_none());
    }
}
