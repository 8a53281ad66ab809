use crate::generator::Generator;
use rand::distr::Alphanumeric;
use rand::Rng;
use warren_core::ShortId;

pub const DEFAULT_LENGTH: usize = 8;

/// Draws ids uniformly from `[a-zA-Z0-9]`.
///
/// Eight characters give 62^8 (about 2.2e14) possible ids.
#[derive(Debug, Clone, Copy)]
pub struct RandomGenerator {
    length: usize,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self::with_length(DEFAULT_LENGTH)
    }

    /// Lengths outside `1..=64` are clamped into that range.
    pub fn with_length(length: usize) -> Self {
        Self {
            length: length.clamp(1, 64),
        }
    }
}

impl Default for RandomGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortId {
        let id: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect();
        ShortId::new_unchecked(id)
    }
}
