use crate::generator::Generator;
use std::sync::atomic::{AtomicU64, Ordering};
use warren_core::ShortId;

/// Sequential ids like "wr000000", "wr000001", ...
///
/// Unique within one instance only. The counter is not persisted, so a
/// restarted process must be given a fresh prefix or an offset past the
/// ids it already handed out.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl SeqGenerator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    /// Starts counting at `offset`.
    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> ShortId {
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        ShortId::new_unchecked(format!("{}{:06}", self.prefix, count))
    }
}
