use std::future::Future;

use chrono::NaiveDate;

use crate::error::ReconcileResult;
use crate::types::MatchRecord;

/// Durable storage for match records.
///
/// Rows are tagged with the partition (worker) that wrote them so that partitioned runs can purge
/// only their own output. Implementations write each call atomically: either every record of a
/// bulk insert lands or none does.
pub trait MatchStore: Send + Sync {
    /// Returns the name of the store, used in logs and metrics.
    fn name() -> &'static str;

    /// Inserts all `records` in one bulk write.
    fn bulk_insert(
        &self,
        partition_id: Option<u16>,
        records: Vec<MatchRecord>,
    ) -> impl Future<Output = ReconcileResult<()>> + Send;

    /// Deletes rows for `report_date`, restricted to `partition_id` when set.
    ///
    /// Returns the number of deleted rows.
    fn delete_by_date_and_partition(
        &self,
        report_date: NaiveDate,
        partition_id: Option<u16>,
    ) -> impl Future<Output = ReconcileResult<u64>> + Send;
}
