//! Identity & key material (C5, C10): the unified identity record and the
//! encrypted-backup lifecycle that lets it be recovered from a single
//! secret on any device (spec §3, §4.4).

pub mod backup;
pub mod error;
pub mod model;
pub mod validation;

pub use backup::{
    backup_key, open_sealed_blob, publish_identity_backup, read_blob_from_disk, recover_from_dht,
    seal_identity, write_blob_to_disk, RawIdentityMaterial, SealedBlob,
};
pub use error::{IdentityError, Result};
pub use model::{Identity, Profile, RegisteredName};
