use crate::error::{PipelineError, Result};
use std::time::Duration;
use typed_builder::TypedBuilder;

pub const DEFAULT_SHARDS: usize = 3;
pub const DEFAULT_SHARD_CAPACITY: usize = 256;
pub const DEFAULT_FAN_IN_CAPACITY: usize = 2048;
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;
pub const DEFAULT_BATCH_TIMEOUT: Duration = Duration::from_millis(200);

/// Sizing and batching knobs for a [`DeletionPipeline`](crate::DeletionPipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct PipelineConfig {
    /// Number of shard queues, and of workers draining them.
    #[builder(default = DEFAULT_SHARDS)]
    pub shards: usize,
    /// Bound of each shard queue. A push into a full shard is dropped.
    #[builder(default = DEFAULT_SHARD_CAPACITY)]
    pub shard_capacity: usize,
    /// Bound of the queue between the shard workers and the aggregator.
    #[builder(default = DEFAULT_FAN_IN_CAPACITY)]
    pub fan_in_capacity: usize,
    /// Flush as soon as this many tasks are buffered.
    #[builder(default = DEFAULT_MAX_BATCH_SIZE)]
    pub max_batch_size: usize,
    /// Flush once no task has arrived for this long.
    #[builder(default = DEFAULT_BATCH_TIMEOUT)]
    pub batch_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("shards", self.shards),
            ("shard_capacity", self.shard_capacity),
            ("fan_in_capacity", self.fan_in_capacity),
            ("max_batch_size", self.max_batch_size),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(PipelineError::InvalidConfig(format!(
                "{name} must be greater than zero"
            )));
        }
        if self.batch_timeout.is_zero() {
            return Err(PipelineError::InvalidConfig(
                "batch_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Total number of tasks the shard queues can hold at once.
    pub fn total_capacity(&self) -> usize {
        self.shards.saturating_mul(self.shard_capacity)
    }
}
