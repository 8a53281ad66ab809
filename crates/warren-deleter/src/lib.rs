//! Asynchronous soft-delete pipeline.
//!
//! Request handlers hand a [`DeleteTask`](warren_core::DeleteTask) to
//! [`DeletionPipeline::enqueue`] and return immediately. Tasks are spread
//! over a few bounded shard queues, funnelled into one aggregator, and
//! applied to the store in per-owner batches.
//!
//! ```text
//!   enqueue ──► shard 0 ──┐
//!   enqueue ──► shard 1 ──┼──► fan-in ──► aggregator ──► DeletionSink::mark_deleted
//!   enqueue ──► shard 2 ──┘
//! ```

mod aggregator;
pub mod config;
pub mod error;
pub mod observer;
pub mod pipeline;
mod queue;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use observer::{FlushObserver, TracingObserver};
pub use pipeline::{DeletionPipeline, PipelineState};
