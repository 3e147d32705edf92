use thiserror::Error;

/// Identity-layer error taxonomy (spec §7): decryption failures are
/// fatal and distinct from "not found"; signature failures are distinct
/// from framing/config failures.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("not found")]
    NotFound,
    #[error("signature invalid")]
    SignatureInvalid,
    #[error("decryption failed: wrong key or tampered blob")]
    DecryptionFailed,
    #[error("framing error: {0}")]
    Framing(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("crypto error: {0}")]
    Crypto(#[from] dna_crypto::CryptoError),
    #[error("chunked layer error: {0}")]
    Chunked(#[from] dna_chunked::ChunkedError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;
