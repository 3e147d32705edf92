//! Bootstrap lifecycle (C2, C3) and the external DHT session contract (C4).

pub mod cache;
pub mod discovery;
pub mod error;
pub mod session;

pub use cache::{BootstrapCache, BootstrapEntry};
pub use discovery::{BootstrapDiscovery, CompletionCallback, DiscoveryConfig, DiscoveryHandle};
pub use error::BootstrapError;
pub use session::{DhtSession, SessionHandle, SessionStatus};
