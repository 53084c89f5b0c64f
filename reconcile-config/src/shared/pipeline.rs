use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::shared::base::ensure_non_zero;
use crate::shared::{BatchConfig, PageRangeConfig, QueueConfig, ValidationError};

/// Run-level configuration of one reconciliation pipeline.
///
/// Built once before the run and never mutated afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Date stored on every match record and used to compute activity flags.
    pub report_date: NaiveDate,
    /// Worker identifier for statically partitioned runs.
    ///
    /// Unpartitioned rows are stored under worker id 0, so a partition id is never 0.
    #[serde(default)]
    pub partition_id: Option<u16>,
    /// Skip all writes and deletes against the sink storage.
    #[serde(default)]
    pub dry_run: bool,
    /// Purge rows previously written for the report date (and partition) before the run.
    #[serde(default)]
    pub delete_existing: bool,
    /// Remote directory producer queue.
    #[serde(default)]
    pub remote: QueueConfig,
    /// Relational producer queue.
    #[serde(default)]
    pub relational: QueueConfig,
    #[serde(default)]
    pub page_range: PageRangeConfig,
    /// Sink batching.
    #[serde(default)]
    pub batch: BatchConfig,
}

impl PipelineConfig {
    /// Creates a configuration with defaults for everything but the report date.
    pub fn new(report_date: NaiveDate) -> Self {
        Self {
            report_date,
            partition_id: None,
            dry_run: false,
            delete_existing: false,
            remote: QueueConfig::default(),
            relational: QueueConfig::default(),
            page_range: PageRangeConfig::default(),
            batch: BatchConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(partition_id) = self.partition_id {
            ensure_non_zero("partition_id", partition_id as u64)?;
        }
        self.remote.validate("remote")?;
        self.relational.validate("relational")?;
        self.page_range.validate()?;
        self.batch.validate()
    }
}
