use crate::error::StorageError;
use crate::short_id::{OwnerId, ShortId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    pub short_id: ShortId,
    /// The original URL that was shortened.
    pub original_url: String,
    /// Who created the record. Never changes after creation.
    pub owner_id: OwnerId,
    /// Soft-delete flag. Only ever flips from `false` to `true`.
    pub deleted: bool,
}

/// A `(short id, url)` pair, used for bulk ingestion and owner listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub short_id: ShortId,
    pub original_url: String,
}

impl BatchItem {
    pub fn new(short_id: ShortId, original_url: impl Into<String>) -> Self {
        Self {
            short_id,
            original_url: original_url.into(),
        }
    }
}

/// Whether a save created a new record or hit the dedup index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Created,
    /// The URL was shortened before; the returned id is the existing one.
    AlreadyExists,
}

/// Result of a single [`UrlStore::save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved {
    pub short_id: ShortId,
    pub status: SaveStatus,
}

impl Saved {
    pub fn created(short_id: ShortId) -> Self {
        Self {
            short_id,
            status: SaveStatus::Created,
        }
    }

    pub fn existing(short_id: ShortId) -> Self {
        Self {
            short_id,
            status: SaveStatus::AlreadyExists,
        }
    }

    pub fn is_created(&self) -> bool {
        self.status == SaveStatus::Created
    }
}

/// Result of a [`UrlStore::save_batch`], keyed by original URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub created: HashMap<String, ShortId>,
    pub existing: HashMap<String, ShortId>,
}

/// A key-value store of shortened URLs with a global dedup index:
/// at most one short id ever maps to a given original URL.
///
/// Implementations serialize mutations and let reads proceed concurrently.
#[async_trait]
pub trait UrlStore: Send + Sync + 'static {
    /// Stores `url` under `proposed_id` unless the URL is already known,
    /// in which case the existing id is returned with
    /// [`SaveStatus::AlreadyExists`].
    ///
    /// Fails with [`StorageError::DuplicateShortId`] if `proposed_id` is
    /// already bound to a different URL.
    async fn save(&self, owner: &OwnerId, proposed_id: &ShortId, url: &str) -> Result<Saved>;

    /// Applies [`save`](UrlStore::save) to every item as one atomic unit.
    async fn save_batch(&self, owner: &OwnerId, items: &[BatchItem]) -> Result<BatchOutcome>;

    /// Returns the record for `id`, including soft-deleted ones.
    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>>;

    /// Lists everything `owner` created, in insertion order.
    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<BatchItem>>;

    /// Soft-deletes every id in `ids` that belongs to `owner`.
    ///
    /// Unknown ids and ids owned by someone else are skipped silently.
    /// Repeating the call is a no-op.
    async fn mark_deleted(&self, owner: &OwnerId, ids: &[ShortId]) -> Result<()>;

    /// Liveness check.
    async fn ping(&self) -> Result<()>;
}

/// The single store operation the deletion pipeline depends on.
///
/// Every shared [`UrlStore`] is a sink, so the pipeline can be built from
/// an `Arc` of any backend without knowing which one it is.
#[async_trait]
pub trait DeletionSink: Send + Sync + 'static {
    async fn mark_deleted(&self, owner: &OwnerId, ids: &[ShortId]) -> Result<()>;
}

#[async_trait]
impl<S: UrlStore + ?Sized> DeletionSink for Arc<S> {
    async fn mark_deleted(&self, owner: &OwnerId, ids: &[ShortId]) -> Result<()> {
        UrlStore::mark_deleted(self.as_ref(), owner, ids).await
    }
}
