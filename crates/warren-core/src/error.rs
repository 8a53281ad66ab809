use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors raised while validating identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid short id: {0}")]
    InvalidShortId(String),
    #[error("invalid owner id: {0}")]
    InvalidOwnerId(String),
}

/// Hard failures of a [`UrlStore`](crate::store::UrlStore) backend.
///
/// A URL that was already shortened is *not* an error; it is reported
/// through [`SaveStatus::AlreadyExists`](crate::store::SaveStatus).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("short id is already bound to another url: {0}")]
    DuplicateShortId(String),
    #[error("storage i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("schema migration failed: {0}")]
    Migration(String),
}
