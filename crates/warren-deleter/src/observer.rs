use std::sync::Arc;
use tracing::warn;
use warren_core::{OwnerId, ShortId, StorageError};

/// Receives the flush failures the pipeline swallows.
///
/// A failed `mark_deleted` is never retried and never reaches the caller
/// that enqueued the task; this hook is the only place it surfaces.
pub trait FlushObserver: Send + Sync + 'static {
    fn on_flush_error(&self, owner: &OwnerId, ids: &[ShortId], error: &StorageError);
}

/// Logs flush failures at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl FlushObserver for TracingObserver {
    fn on_flush_error(&self, owner: &OwnerId, ids: &[ShortId], error: &StorageError) {
        warn!(owner = %owner, ids = ids.len(), error = %error, "failed to apply deletions");
    }
}

impl<O: FlushObserver + ?Sized> FlushObserver for Arc<O> {
    fn on_flush_error(&self, owner: &OwnerId, ids: &[ShortId], error: &StorageError) {
        self.as_ref().on_flush_error(owner, ids, error);
    }
}
