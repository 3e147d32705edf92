//! Engine facade: the object that owns the DHT session handle and wires
//! bootstrap discovery, identity backup/recovery, and record operations
//! together (spec §9 — replacing the original's process-wide singletons
//! with an explicit, droppable owner).

pub mod config;
pub mod engine;
pub mod identity;
pub mod records;

pub use config::EngineConfig;
pub use engine::Engine;
