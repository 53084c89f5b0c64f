use chrono::NaiveDate;

use crate::bail;
use crate::error::{ErrorKind, ReconcileResult};
use crate::sink::MatchStore;
use crate::types::MatchRecord;

/// Match store whose writes and deletes always fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingMatchStore;

impl MatchStore for FailingMatchStore {
    fn name() -> &'static str {
        "failing"
    }

    async fn bulk_insert(
        &self,
        _partition_id: Option<u16>,
        records: Vec<MatchRecord>,
    ) -> ReconcileResult<()> {
        bail!(
            ErrorKind::SinkWriteFailed,
            "Bulk insert rejected",
            format!("{} records", records.len())
        )
    }

    async fn delete_by_date_and_partition(
        &self,
        report_date: NaiveDate,
        _partition_id: Option<u16>,
    ) -> ReconcileResult<u64> {
        bail!(
            ErrorKind::SinkWriteFailed,
            "Delete rejected",
            format!("report date {report_date}")
        )
    }
}
