use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use warren_core::DeleteTask;

/// Producer half of one bounded shard queue.
#[derive(Debug)]
pub(crate) struct ShardQueue {
    index: usize,
    tx: Sender<DeleteTask>,
}

impl ShardQueue {
    pub(crate) fn new(index: usize, capacity: usize) -> (Self, Receiver<DeleteTask>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { index, tx }, rx)
    }

    /// Pushes without waiting. The task is dropped if the queue is full or
    /// its worker has stopped receiving.
    pub(crate) fn try_enqueue(&self, task: DeleteTask) -> bool {
        match self.tx.try_send(task) {
            Ok(()) => true,
            Err(TrySendError::Full(task)) => {
                debug!(shard = self.index, owner = %task.owner, "shard queue full, dropping task");
                false
            }
            Err(TrySendError::Closed(task)) => {
                debug!(shard = self.index, owner = %task.owner, "shard queue closed, dropping task");
                false
            }
        }
    }
}

/// Forwards everything from one shard into the fan-in queue.
///
/// On cancellation the shard stops accepting, hands over what it already
/// holds, and exits. Dropping `fan_in` on return is what lets the
/// aggregator see the end of the stream.
pub(crate) async fn run_shard(
    index: usize,
    mut rx: Receiver<DeleteTask>,
    fan_in: Sender<DeleteTask>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            task = rx.recv() => match task {
                Some(task) => {
                    if fan_in.send(task).await.is_err() {
                        warn!(shard = index, "fan-in queue closed, shard worker exiting");
                        return;
                    }
                }
                None => return,
            },
        }
    }

    rx.close();
    let mut forwarded = 0usize;
    while let Ok(task) = rx.try_recv() {
        if fan_in.send(task).await.is_err() {
            warn!(shard = index, "fan-in queue closed while draining");
            return;
        }
        forwarded += 1;
    }
    debug!(shard = index, forwarded, "shard drained");
}

#[cfg(test)]
mod tests {
    use super::*;
    use warren_core::{OwnerId, ShortId};

    fn task(id: &str) -> DeleteTask {
        DeleteTask::new(
            OwnerId::new_unchecked("alice"),
            vec![ShortId::new_unchecked(id)],
        )
    }

    #[test]
    fn try_enqueue_drops_when_full() {
        let (queue, _rx) = ShardQueue::new(0, 2);

        assert!(queue.try_enqueue(task("a")));
        assert!(queue.try_enqueue(task("b")));
        assert!(!queue.try_enqueue(task("c")));
    }

    #[test]
    fn try_enqueue_drops_when_receiver_closed() {
        let (queue, mut rx) = ShardQueue::new(0, 2);
        rx.close();

        assert!(!queue.try_enqueue(task("a")));
    }

    #[tokio::test]
    async fn cancelled_shard_forwards_what_it_holds() {
        let (queue, rx) = ShardQueue::new(0, 8);
        let (fan_in, mut out) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        for id in ["a", "b", "c"] {
            assert!(queue.try_enqueue(task(id)));
        }
        cancel.cancel();
        run_shard(0, rx, fan_in, cancel).await;

        let mut seen = vec![];
        while let Some(task) = out.recv().await {
            seen.push(task.short_ids[0].to_string());
        }
        seen.sort();
        assert_eq!(seen, vec!["a", "b", "c"]);
        assert!(!queue.try_enqueue(task("d")));
    }
}
