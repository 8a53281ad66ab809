use crate::aggregator::Aggregator;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::observer::{FlushObserver, TracingObserver};
use crate::queue::{run_shard, ShardQueue};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use warren_core::{DeleteTask, DeletionSink};

const RUNNING: u8 = 0;
const DRAINING: u8 = 1;
const STOPPED: u8 = 2;

/// Lifecycle of a [`DeletionPipeline`]. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running,
    Draining,
    Stopped,
}

impl PipelineState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            RUNNING => Self::Running,
            DRAINING => Self::Draining,
            _ => Self::Stopped,
        }
    }
}

/// Batches soft-deletes off the request path.
///
/// Enqueueing never waits: a full shard drops the task and reports `false`.
/// Everything accepted before [`close`](Self::close) is flushed before
/// `close` returns. Flush failures go to the [`FlushObserver`] and nowhere
/// else.
pub struct DeletionPipeline {
    shards: Vec<ShardQueue>,
    next_shard: AtomicUsize,
    state: AtomicU8,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl DeletionPipeline {
    /// Spawns the shard workers and the aggregator on the current tokio
    /// runtime, reporting flush failures through [`TracingObserver`].
    pub fn start<S: DeletionSink>(config: PipelineConfig, sink: S) -> Result<Self> {
        Self::with_observer(config, sink, TracingObserver)
    }

    pub fn with_observer<S, O>(config: PipelineConfig, sink: S, observer: O) -> Result<Self>
    where
        S: DeletionSink,
        O: FlushObserver,
    {
        config.validate()?;

        let cancel = CancellationToken::new();
        let (fan_in_tx, fan_in_rx) = mpsc::channel(config.fan_in_capacity);
        let mut shards = Vec::with_capacity(config.shards);
        let mut handles = Vec::with_capacity(config.shards + 1);

        for index in 0..config.shards {
            let (queue, rx) = ShardQueue::new(index, config.shard_capacity);
            shards.push(queue);
            handles.push(tokio::spawn(run_shard(
                index,
                rx,
                fan_in_tx.clone(),
                cancel.clone(),
            )));
        }
        // The shard workers now hold the only fan-in senders.
        drop(fan_in_tx);

        let aggregator = Aggregator::new(sink, observer, config.max_batch_size, config.batch_timeout);
        handles.push(tokio::spawn(aggregator.run(fan_in_rx)));

        info!(
            shards = config.shards,
            shard_capacity = config.shard_capacity,
            max_batch_size = config.max_batch_size,
            batch_timeout_ms = config.batch_timeout.as_millis() as u64,
            "deletion pipeline started"
        );

        Ok(Self {
            shards,
            next_shard: AtomicUsize::new(0),
            state: AtomicU8::new(RUNNING),
            cancel,
            handles: Mutex::new(handles),
        })
    }

    /// Offers `task` to the next shard in round-robin order.
    ///
    /// Returns `false` if the task was dropped, either because that shard is
    /// full or because the pipeline is shutting down.
    pub fn enqueue(&self, task: DeleteTask) -> bool {
        if self.state() != PipelineState::Running {
            return false;
        }
        let shard = self.next_shard.fetch_add(1, Ordering::Relaxed) % self.shards.len();
        self.shards[shard].try_enqueue(task)
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_raw(self.state.load(Ordering::Acquire))
    }

    /// Stops intake, flushes every accepted task and waits for all workers.
    ///
    /// Safe to call more than once. A call that overlaps a running close
    /// waits for that close to finish.
    pub async fn close(&self) {
        if self
            .state
            .compare_exchange(RUNNING, DRAINING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            info!("deletion pipeline draining");
            self.cancel.cancel();
        }

        let mut handles = self.handles.lock().await;
        if handles.is_empty() {
            return;
        }
        for handle in handles.drain(..) {
            if let Err(err) = handle.await {
                warn!(error = %err, "deletion pipeline task failed");
            }
        }

        self.state.store(STOPPED, Ordering::Release);
        info!("deletion pipeline stopped");
    }
}

impl Drop for DeletionPipeline {
    fn drop(&mut self) {
        // Detached workers still drain and flush; nobody waits for them.
        self.cancel.cancel();
    }
}
