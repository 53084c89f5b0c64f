use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::ensure_non_zero;

/// Output batching configuration for the match sink.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BatchConfig {
    /// Number of match records buffered before one bulk write is issued.
    #[serde(default = "default_batch_max_size")]
    pub max_size: usize,
}

impl BatchConfig {
    /// Default number of match records per bulk write.
    pub const DEFAULT_MAX_SIZE: usize = 10000;

    /// Ensures `max_size` is non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_non_zero("batch.max_size", self.max_size as u64)
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_size: default_batch_max_size(),
        }
    }
}

fn default_batch_max_size() -> usize {
    BatchConfig::DEFAULT_MAX_SIZE
}
