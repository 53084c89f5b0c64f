use std::mem;

use chrono::NaiveDate;
use metrics::counter;
use reconcile_config::shared::BatchConfig;
use tracing::{debug, info, warn};

use crate::bail;
use crate::error::{ErrorKind, ReconcileResult};
use crate::metrics::{DRY_RUN_LABEL, RECONCILE_SINK_FLUSHES_TOTAL, RECONCILE_SINK_RECORDS_TOTAL};
use crate::sink::MatchStore;
use crate::types::MatchRecord;

/// Counters of a [`BatchSink`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    /// Bulk writes performed, or that would have been performed under dry run.
    pub flushes: u64,
    /// Records flushed, including records whose write was skipped under dry run.
    pub records_written: u64,
    /// Rows removed by the pre-run purge.
    pub records_purged: u64,
}

/// Buffers match records and writes them to a [`MatchStore`] in bulk.
///
/// A flush happens as soon as the buffer holds `max_size` records, and once more explicitly at
/// the end of the run. Under dry run the store is never called but counters advance identically.
#[derive(Debug)]
pub struct BatchSink<S> {
    store: S,
    max_size: usize,
    dry_run: bool,
    partition_id: Option<u16>,
    buffer: Vec<MatchRecord>,
    stats: SinkStats,
}

impl<S> BatchSink<S>
where
    S: MatchStore,
{
    pub fn new(
        store: S,
        config: &BatchConfig,
        dry_run: bool,
        partition_id: Option<u16>,
    ) -> ReconcileResult<Self> {
        if config.max_size == 0 {
            bail!(
                ErrorKind::ConfigError,
                "Sink batch size must be greater than 0"
            );
        }

        info!(
            store = S::name(),
            batch_size = config.max_size,
            dry_run,
            partition_id,
            "configured match sink"
        );

        Ok(Self {
            store,
            max_size: config.max_size,
            dry_run,
            partition_id,
            buffer: Vec::with_capacity(config.max_size),
            stats: SinkStats::default(),
        })
    }

    /// Buffers `record`, flushing if the buffer reached its capacity.
    pub async fn add(&mut self, record: MatchRecord) -> ReconcileResult<()> {
        self.buffer.push(record);

        if self.buffer.len() >= self.max_size {
            self.flush().await?;
        }

        Ok(())
    }

    /// Writes every buffered record in one bulk write and clears the buffer.
    ///
    /// Does nothing when the buffer is empty. Write failures are returned as-is and never
    /// retried.
    pub async fn flush(&mut self) -> ReconcileResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch = mem::replace(&mut self.buffer, Vec::with_capacity(self.max_size));
        let batch_size = batch.len();

        if self.dry_run {
            debug!(batch_size, "dry run, skipping bulk write");
        } else {
            self.store.bulk_insert(self.partition_id, batch).await?;
            debug!(batch_size, "flushed match batch");
        }

        self.stats.flushes += 1;
        self.stats.records_written += batch_size as u64;

        let dry_run = if self.dry_run { "true" } else { "false" };
        counter!(RECONCILE_SINK_FLUSHES_TOTAL, DRY_RUN_LABEL => dry_run).increment(1);
        counter!(RECONCILE_SINK_RECORDS_TOTAL, DRY_RUN_LABEL => dry_run)
            .increment(batch_size as u64);

        Ok(())
    }

    /// Deletes previously written rows for `report_date` within this sink's partition.
    ///
    /// Without a partition every worker's rows for the date are deleted. Skipped under dry run.
    pub async fn purge_for_report_date(&mut self, report_date: NaiveDate) -> ReconcileResult<u64> {
        if self.dry_run {
            warn!(%report_date, "dry run, skipping purge of existing matches");
            return Ok(0);
        }

        let deleted = self
            .store
            .delete_by_date_and_partition(report_date, self.partition_id)
            .await?;

        info!(
            %report_date,
            partition_id = self.partition_id,
            deleted,
            "purged existing matches"
        );
        self.stats.records_purged += deleted;

        Ok(deleted)
    }

    /// Number of records waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn stats(&self) -> SinkStats {
        self.stats
    }
}
