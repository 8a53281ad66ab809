use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use warren_core::store::Result;
use warren_core::{BatchItem, BatchOutcome, OwnerId, ShortId, StorageError, UrlRecord};

/// The maps behind the in-process backends.
///
/// `Index` is not synchronized itself; [`InMemoryStore`](crate::InMemoryStore)
/// and [`FileStore`](crate::FileStore) wrap it in a reader-writer lock. All
/// planning methods take `&self` so a caller can validate a whole mutation
/// before touching anything.
#[derive(Debug, Default)]
pub(crate) struct Index {
    records: HashMap<ShortId, UrlRecord>,
    by_url: HashMap<String, ShortId>,
    by_owner: HashMap<OwnerId, Vec<BatchItem>>,
}

/// A validated batch: what the caller gets back, and what still has to be
/// written.
#[derive(Debug, Default)]
pub(crate) struct BatchPlan {
    pub outcome: BatchOutcome,
    pub to_create: Vec<BatchItem>,
}

impl Index {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn existing_id(&self, url: &str) -> Option<&ShortId> {
        self.by_url.get(url)
    }

    /// Fails if `id` already names a record. Only meaningful once the URL
    /// itself is known to be new.
    pub fn ensure_id_free(&self, id: &ShortId) -> Result<()> {
        if self.records.contains_key(id) {
            return Err(StorageError::DuplicateShortId(id.to_string()));
        }
        Ok(())
    }

    /// Partitions `items` into new and already-shortened URLs.
    ///
    /// Items are considered in order, so a URL repeated inside the batch is
    /// created once and reported as existing afterwards.
    pub fn plan_batch(&self, items: &[BatchItem]) -> Result<BatchPlan> {
        let mut plan = BatchPlan::default();
        let mut pending_urls: HashMap<&str, &ShortId> = HashMap::new();
        let mut pending_ids: HashSet<&ShortId> = HashSet::new();

        for item in items {
            let url = item.original_url.as_str();

            if let Some(existing) = self.existing_id(url) {
                plan.outcome.existing.insert(url.to_owned(), existing.clone());
                continue;
            }
            if let Some(pending) = pending_urls.get(url) {
                plan.outcome
                    .existing
                    .insert(url.to_owned(), (*pending).clone());
                continue;
            }

            self.ensure_id_free(&item.short_id)?;
            if !pending_ids.insert(&item.short_id) {
                return Err(StorageError::DuplicateShortId(item.short_id.to_string()));
            }

            pending_urls.insert(url, &item.short_id);
            plan.outcome
                .created
                .insert(url.to_owned(), item.short_id.clone());
            plan.to_create.push(item.clone());
        }

        Ok(plan)
    }

    pub fn insert(&mut self, owner: &OwnerId, item: BatchItem) {
        let record = UrlRecord {
            short_id: item.short_id.clone(),
            original_url: item.original_url.clone(),
            owner_id: owner.clone(),
            deleted: false,
        };
        self.by_url
            .insert(item.original_url.clone(), item.short_id.clone());
        self.records.insert(item.short_id.clone(), record);
        self.by_owner.entry(owner.clone()).or_default().push(item);
    }

    pub fn get(&self, id: &ShortId) -> Option<UrlRecord> {
        self.records.get(id).cloned()
    }

    pub fn user_urls(&self, owner: &OwnerId) -> Vec<BatchItem> {
        self.by_owner.get(owner).cloned().unwrap_or_default()
    }

    /// Records in `ids` that `owner` may delete and that are not deleted
    /// yet, without repeats.
    pub fn deletable<'a>(&'a self, owner: &OwnerId, ids: &[ShortId]) -> Vec<&'a UrlRecord> {
        let mut seen = HashSet::new();
        ids.iter()
            .filter_map(|id| self.records.get(id))
            .filter(|record| &record.owner_id == owner && !record.deleted)
            .filter(|record| seen.insert(&record.short_id))
            .collect()
    }

    pub fn set_deleted(&mut self, id: &ShortId) {
        if let Some(record) = self.records.get_mut(id) {
            record.deleted = true;
        }
    }

    /// Applies one replayed log record. Later records for the same id
    /// replace earlier ones.
    ///
    /// Returns `false` and leaves the index untouched when the record's URL
    /// is already bound to a different id; the first binding wins.
    pub fn apply_replayed(&mut self, record: UrlRecord) -> bool {
        if self
            .by_url
            .get(&record.original_url)
            .is_some_and(|bound| *bound != record.short_id)
        {
            return false;
        }

        match self.records.entry(record.short_id.clone()) {
            Entry::Vacant(slot) => {
                self.by_url
                    .insert(record.original_url.clone(), record.short_id.clone());
                self.by_owner
                    .entry(record.owner_id.clone())
                    .or_default()
                    .push(BatchItem::new(
                        record.short_id.clone(),
                        record.original_url.clone(),
                    ));
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                if current.original_url != record.original_url {
                    if self.by_url.get(&current.original_url) == Some(&record.short_id) {
                        self.by_url.remove(&current.original_url);
                    }
                    if let Some(item) = self
                        .by_owner
                        .get_mut(&current.owner_id)
                        .and_then(|items| items.iter_mut().find(|i| i.short_id == record.short_id))
                    {
                        item.original_url = record.original_url.clone();
                    }
                }

                self.by_url
                    .insert(record.original_url.clone(), record.short_id.clone());
                current.original_url = record.original_url;
                current.deleted = record.deleted;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ShortId {
        ShortId::new_unchecked(s)
    }

    fn owner(s: &str) -> OwnerId {
        OwnerId::new_unchecked(s)
    }

    #[test]
    fn plan_batch_dedups_within_the_batch() {
        let index = Index::default();
        let items = vec![
            BatchItem::new(id("a1"), "https://a.com"),
            BatchItem::new(id("a2"), "https://a.com"),
        ];

        let plan = index.plan_batch(&items).unwrap();

        assert_eq!(plan.to_create.len(), 1);
        assert_eq!(plan.outcome.created["https://a.com"], id("a1"));
        assert_eq!(plan.outcome.existing["https://a.com"], id("a1"));
    }

    #[test]
    fn plan_batch_rejects_reused_id() {
        let mut index = Index::default();
        index.insert(&owner("alice"), BatchItem::new(id("a1"), "https://a.com"));

        let err = index
            .plan_batch(&[BatchItem::new(id("a1"), "https://b.com")])
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateShortId(_)));

        let err = index
            .plan_batch(&[
                BatchItem::new(id("b1"), "https://b.com"),
                BatchItem::new(id("b1"), "https://c.com"),
            ])
            .unwrap_err();
        assert!(matches!(err, StorageError::DuplicateShortId(_)));
    }

    #[test]
    fn deletable_skips_foreign_deleted_and_repeated_ids() {
        let mut index = Index::default();
        index.insert(&owner("alice"), BatchItem::new(id("a1"), "https://a.com"));
        index.insert(&owner("alice"), BatchItem::new(id("a2"), "https://b.com"));
        index.insert(&owner("bob"), BatchItem::new(id("b1"), "https://c.com"));
        index.set_deleted(&id("a2"));

        let ids = [id("a1"), id("a1"), id("a2"), id("b1"), id("nope")];
        let found: Vec<_> = index
            .deletable(&owner("alice"), &ids)
            .into_iter()
            .map(|r| r.short_id.clone())
            .collect();

        assert_eq!(found, vec![id("a1")]);
    }

    #[test]
    fn replay_last_record_wins() {
        let mut index = Index::default();
        let mut record = UrlRecord {
            short_id: id("a1"),
            original_url: "https://a.com".into(),
            owner_id: owner("alice"),
            deleted: false,
        };
        index.apply_replayed(record.clone());
        record.deleted = true;
        index.apply_replayed(record);

        assert!(index.get(&id("a1")).unwrap().deleted);
        assert_eq!(index.existing_id("https://a.com"), Some(&id("a1")));
        assert_eq!(index.user_urls(&owner("alice")).len(), 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn replay_keeps_the_first_id_bound_to_a_url() {
        let mut index = Index::default();
        let record = |short_id: &str, url: &str| UrlRecord {
            short_id: id(short_id),
            original_url: url.into(),
            owner_id: owner("alice"),
            deleted: false,
        };

        assert!(index.apply_replayed(record("a1", "https://u.com")));
        assert!(!index.apply_replayed(record("a2", "https://u.com")));
        assert!(index.apply_replayed(record("b1", "https://b.com")));
        assert!(!index.apply_replayed(record("b1", "https://u.com")));

        assert_eq!(index.existing_id("https://u.com"), Some(&id("a1")));
        assert!(index.get(&id("a2")).is_none());
        assert_eq!(index.get(&id("b1")).unwrap().original_url, "https://b.com");
        assert_eq!(index.user_urls(&owner("alice")).len(), 2);
        assert_eq!(index.len(), 2);
    }
}
