//! Error taxonomy shared by every record type in this crate (spec §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DnaError {
    #[error("not found")]
    NotFound,
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("ownership violation: caller is not the owner")]
    OwnershipViolation,
    #[error("framing error: {0}")]
    Framing(String),
    #[error("transient network failure: {0}")]
    TransientNetwork(String),
    #[error("already voted")]
    AlreadyVoted,
    #[error("max reply depth exceeded")]
    MaxDepthExceeded,
    #[error("caller is not the owner of this record")]
    NotOwner,
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid record field: {0}")]
    Validation(String),
    #[error("crypto error: {0}")]
    Crypto(#[from] dna_crypto::CryptoError),
    #[error("chunked layer error: {0}")]
    Chunked(#[from] dna_chunked::ChunkedError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DnaError>;
