use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("cache database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transient network failure: {0}")]
    TransientNetwork(String),
}

pub type Result<T> = std::result::Result<T, BootstrapError>;
