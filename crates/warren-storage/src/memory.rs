use crate::index::Index;
use async_trait::async_trait;
use parking_lot::RwLock;
use warren_core::store::Result;
use warren_core::{BatchItem, BatchOutcome, OwnerId, Saved, ShortId, UrlRecord, UrlStore};

/// Volatile implementation of [`UrlStore`].
///
/// A single reader-writer lock guards all three maps, so a batch is one
/// critical section and readers never see half of it. Nothing survives a
/// restart.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    index: RwLock<Index>,
}

impl InMemoryStore {
    /// Creates an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UrlStore for InMemoryStore {
    async fn save(&self, owner: &OwnerId, proposed_id: &ShortId, url: &str) -> Result<Saved> {
        let mut index = self.index.write();

        if let Some(existing) = index.existing_id(url) {
            return Ok(Saved::existing(existing.clone()));
        }
        index.ensure_id_free(proposed_id)?;

        index.insert(owner, BatchItem::new(proposed_id.clone(), url));
        Ok(Saved::created(proposed_id.clone()))
    }

    async fn save_batch(&self, owner: &OwnerId, items: &[BatchItem]) -> Result<BatchOutcome> {
        let mut index = self.index.write();

        let plan = index.plan_batch(items)?;
        for item in plan.to_create {
            index.insert(owner, item);
        }
        Ok(plan.outcome)
    }

    async fn get(&self, id: &ShortId) -> Result<Option<UrlRecord>> {
        Ok(self.index.read().get(id))
    }

    async fn user_urls(&self, owner: &OwnerId) -> Result<Vec<BatchItem>> {
        Ok(self.index.read().user_urls(owner))
    }

    async fn mark_deleted(&self, owner: &OwnerId, ids: &[ShortId]) -> Result<()> {
        let mut index = self.index.write();

        let targets: Vec<ShortId> = index
            .deletable(owner, ids)
            .into_iter()
            .map(|record| record.short_id.clone())
            .collect();
        for id in &targets {
            index.set_deleted(id);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}
