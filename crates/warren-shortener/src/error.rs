use thiserror::Error;
use warren_core::{CoreError, StorageError};

#[derive(Debug, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short id: {0}")]
    InvalidShortId(String),
    #[error("invalid owner id: {0}")]
    InvalidOwnerId(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, ShortenerError>;

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortId(message) => Self::InvalidShortId(message),
            CoreError::InvalidOwnerId(message) => Self::InvalidOwnerId(message),
        }
    }
}
