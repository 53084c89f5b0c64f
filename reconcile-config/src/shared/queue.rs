use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::ensure_non_zero;

/// Bounded queue settings for one source producer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct QueueConfig {
    /// Maximum number of records buffered between the producer and the merger.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Number of records requested from the source per fetch.
    ///
    /// The remote directory serves fixed-size pages, so this only bounds relational fetches.
    #[serde(default = "default_batch_fetch_size")]
    pub batch_fetch_size: usize,
    /// How long the merger waits for the next record before treating the side as exhausted.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// When set, the queue is sized as this percentage (1-100) of the upstream population
    /// instead of using `capacity` and `batch_fetch_size` directly.
    #[serde(default)]
    pub working_data_percent: Option<u8>,
}

impl QueueConfig {
    pub const DEFAULT_CAPACITY: usize = 10000;

    pub const DEFAULT_BATCH_FETCH_SIZE: usize = 1000;

    pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;

    /// Returns the dequeue timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Validates the queue settings, prefixing field names with `side`.
    pub fn validate(&self, side: &str) -> Result<(), ValidationError> {
        ensure_non_zero(&format!("{side}.capacity"), self.capacity as u64)?;
        ensure_non_zero(
            &format!("{side}.batch_fetch_size"),
            self.batch_fetch_size as u64,
        )?;
        ensure_non_zero(&format!("{side}.timeout_ms"), self.timeout_ms)?;

        if let Some(percent) = self.working_data_percent
            && !(1..=100).contains(&percent)
        {
            return Err(ValidationError::InvalidFieldValue {
                field: format!("{side}.working_data_percent"),
                constraint: "must be between 1 and 100".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            batch_fetch_size: default_batch_fetch_size(),
            timeout_ms: default_timeout_ms(),
            working_data_percent: None,
        }
    }
}

fn default_capacity() -> usize {
    QueueConfig::DEFAULT_CAPACITY
}

fn default_batch_fetch_size() -> usize {
    QueueConfig::DEFAULT_BATCH_FETCH_SIZE
}

fn default_timeout_ms() -> u64 {
    QueueConfig::DEFAULT_TIMEOUT_MS
}

/// Range of remote directory pages processed by this run.
///
/// Static partitioning across workers is done by giving each worker its own page range.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PageRangeConfig {
    /// First page fetched, 1-based.
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    /// Last page fetched, inclusive. Paging runs until an empty page when unset.
    #[serde(default)]
    pub end_page: Option<u32>,
}

impl PageRangeConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        ensure_non_zero("page_range.start_page", self.start_page as u64)?;

        if let Some(end_page) = self.end_page
            && end_page < self.start_page
        {
            return Err(ValidationError::InvalidPageRange {
                start_page: self.start_page,
                end_page,
            });
        }

        Ok(())
    }
}

impl Default for PageRangeConfig {
    fn default() -> Self {
        Self {
            start_page: default_start_page(),
            end_page: None,
        }
    }
}

fn default_start_page() -> u32 {
    1
}
