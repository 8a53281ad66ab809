use crate::observer::FlushObserver;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::Receiver;
use tracing::debug;
use warren_core::{DeleteTask, DeletionSink, OwnerId, ShortId};

/// Buffers tasks from the fan-in queue and applies them in batches.
pub(crate) struct Aggregator<S, O> {
    sink: S,
    observer: O,
    max_batch_size: usize,
    batch_timeout: Duration,
    buffer: Vec<DeleteTask>,
}

impl<S: DeletionSink, O: FlushObserver> Aggregator<S, O> {
    pub(crate) fn new(sink: S, observer: O, max_batch_size: usize, batch_timeout: Duration) -> Self {
        Self {
            sink,
            observer,
            max_batch_size,
            batch_timeout,
            buffer: Vec::with_capacity(max_batch_size),
        }
    }

    /// Runs until every fan-in sender is gone, then flushes what is left.
    ///
    /// The idle timer restarts on every received task, so a steady trickle
    /// below `max_batch_size` is held until it pauses.
    pub(crate) async fn run(mut self, mut rx: Receiver<DeleteTask>) {
        loop {
            match tokio::time::timeout(self.batch_timeout, rx.recv()).await {
                Ok(Some(task)) => {
                    self.buffer.push(task);
                    if self.buffer.len() >= self.max_batch_size {
                        self.flush().await;
                    }
                }
                Ok(None) => break,
                Err(_) => self.flush().await,
            }
        }

        self.flush().await;
        debug!("aggregator stopped");
    }

    async fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }

        let tasks = std::mem::take(&mut self.buffer);
        let task_count = tasks.len();
        let mut by_owner: HashMap<OwnerId, Vec<ShortId>> = HashMap::new();
        for task in tasks {
            by_owner
                .entry(task.owner)
                .or_default()
                .extend(task.short_ids);
        }
        debug!(tasks = task_count, owners = by_owner.len(), "flushing deletions");

        for (owner, ids) in by_owner {
            if let Err(err) = self.sink.mark_deleted(&owner, &ids).await {
                self.observer.on_flush_error(&owner, &ids, &err);
            }
        }
    }
}
