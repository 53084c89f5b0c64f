use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::ReconcileResult;
use crate::sink::MatchStore;
use crate::types::MatchRecord;

/// Partition id stored for rows written without a partition.
pub const UNPARTITIONED_ID: u16 = 0;

/// A match record as persisted, together with the partition that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMatch {
    pub partition_id: u16,
    pub record: MatchRecord,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<StoredMatch>,
    bulk_writes: Vec<usize>,
}

/// In-memory match store for tests and local runs.
///
/// Keeps every written row plus the size of every bulk write so that batching can be asserted.
#[derive(Debug, Clone, Default)]
pub struct MemoryMatchStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryMatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all stored rows in write order.
    pub async fn rows(&self) -> Vec<StoredMatch> {
        self.inner.lock().await.rows.clone()
    }

    /// Returns the stored match records without their partition.
    pub async fn records(&self) -> Vec<MatchRecord> {
        let inner = self.inner.lock().await;
        inner.rows.iter().map(|row| row.record.clone()).collect()
    }

    /// Returns the number of records of every bulk write, in call order.
    pub async fn bulk_writes(&self) -> Vec<usize> {
        self.inner.lock().await.bulk_writes.clone()
    }

    /// Seeds rows as if a previous run had written them.
    pub async fn seed(&self, partition_id: Option<u16>, records: Vec<MatchRecord>) {
        let partition_id = partition_id.unwrap_or(UNPARTITIONED_ID);
        let mut inner = self.inner.lock().await;
        inner.rows.extend(
            records
                .into_iter()
                .map(|record| StoredMatch {
                    partition_id,
                    record,
                }),
        );
    }
}

impl MatchStore for MemoryMatchStore {
    fn name() -> &'static str {
        "memory"
    }

    async fn bulk_insert(
        &self,
        partition_id: Option<u16>,
        records: Vec<MatchRecord>,
    ) -> ReconcileResult<()> {
        let partition_id = partition_id.unwrap_or(UNPARTITIONED_ID);
        let mut inner = self.inner.lock().await;

        info!(records = records.len(), partition_id, "writing match batch");

        inner.bulk_writes.push(records.len());
        inner.rows.extend(
            records
                .into_iter()
                .map(|record| StoredMatch {
                    partition_id,
                    record,
                }),
        );

        Ok(())
    }

    async fn delete_by_date_and_partition(
        &self,
        report_date: NaiveDate,
        partition_id: Option<u16>,
    ) -> ReconcileResult<u64> {
        let mut inner = self.inner.lock().await;

        let before = inner.rows.len();
        inner.rows.retain(|row| {
            let same_partition = partition_id.is_none_or(|id| id == row.partition_id);
            !(row.record.report_date == report_date && same_partition)
        });

        Ok((before - inner.rows.len()) as u64)
    }
}
