use chrono::NaiveDate;
use reconcile_config::shared::MySqlConnectionConfig;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{MySql, MySqlPool, QueryBuilder};
use tracing::{debug, info};

use crate::error::{ErrorKind, ReconcileError, ReconcileResult};
use crate::reconcile_error;
use crate::sink::MatchStore;
use crate::sink::memory::UNPARTITIONED_ID;
use crate::types::MatchRecord;

/// Columns written for every match record, in bind order.
const MATCH_COLUMNS: &[&str] = &[
    "report_date",
    "relational_user_id",
    "remote_user_id",
    "location_match",
    "specialty_match",
    "classification_match",
    "is_relational_user_active",
    "is_remote_user_active",
    "relational_last_active_date",
    "remote_last_active_date",
    "_worker_id",
    "_remote_page",
    "_remote_row",
];

/// MySQL allows at most 65535 placeholders per prepared statement.
const MAX_PLACEHOLDERS: usize = 65_535;

/// Match store backed by a MySQL table.
///
/// Each bulk insert runs inside one transaction, split into multi-row `INSERT` statements that
/// stay under the placeholder limit.
#[derive(Debug, Clone)]
pub struct MySqlMatchStore {
    pool: MySqlPool,
    table: String,
}

impl MySqlMatchStore {
    /// Creates a store writing to an already validated table name.
    pub fn new(pool: MySqlPool, table: impl Into<String>) -> Self {
        Self {
            pool,
            table: table.into(),
        }
    }

    fn rows_per_statement() -> usize {
        MAX_PLACEHOLDERS / MATCH_COLUMNS.len()
    }
}

/// Connects a pool to the sink database.
pub async fn connect_sink_pool(config: &MySqlConnectionConfig) -> ReconcileResult<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(config.with_db())
        .await
        .map_err(|err| sink_error(ErrorKind::SinkConnectionFailed, "Sink connection failed", err))?;

    info!(host = %config.host, database = %config.name, "connected to sink database");

    Ok(pool)
}

fn sink_error(kind: ErrorKind, description: &'static str, err: sqlx::Error) -> ReconcileError {
    reconcile_error!(kind, description, err.to_string(), source: err)
}

fn write_error(err: sqlx::Error) -> ReconcileError {
    let kind = match &err {
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut => {
            ErrorKind::SinkConnectionFailed
        }
        _ => ErrorKind::SinkWriteFailed,
    };

    sink_error(kind, "Match table write failed", err)
}

impl MatchStore for MySqlMatchStore {
    fn name() -> &'static str {
        "mysql"
    }

    async fn bulk_insert(
        &self,
        partition_id: Option<u16>,
        records: Vec<MatchRecord>,
    ) -> ReconcileResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let worker_id = partition_id.unwrap_or(UNPARTITIONED_ID);
        let mut transaction = self.pool.begin().await.map_err(write_error)?;

        for chunk in records.chunks(Self::rows_per_statement()) {
            let mut builder: QueryBuilder<MySql> = QueryBuilder::new(format!(
                "insert into {} ({}) ",
                self.table,
                MATCH_COLUMNS.join(", ")
            ));

            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.report_date)
                    .push_bind(record.relational_user_id)
                    .push_bind(record.remote_user_id)
                    .push_bind(record.location_match)
                    .push_bind(record.specialty_match)
                    .push_bind(record.classification_match)
                    .push_bind(record.is_relational_user_active)
                    .push_bind(record.is_remote_user_active)
                    .push_bind(record.relational_last_active_date)
                    .push_bind(record.remote_last_active_date)
                    .push_bind(worker_id)
                    .push_bind(record.remote_page)
                    .push_bind(record.remote_row);
            });

            builder
                .build()
                .execute(&mut *transaction)
                .await
                .map_err(write_error)?;

            debug!(rows = chunk.len(), table = %self.table, "inserted match rows");
        }

        transaction.commit().await.map_err(write_error)?;

        Ok(())
    }

    async fn delete_by_date_and_partition(
        &self,
        report_date: NaiveDate,
        partition_id: Option<u16>,
    ) -> ReconcileResult<u64> {
        let mut builder: QueryBuilder<MySql> =
            QueryBuilder::new(format!("delete from {} where report_date = ", self.table));
        builder.push_bind(report_date);

        if let Some(partition_id) = partition_id {
            builder.push(" and _worker_id = ").push_bind(partition_id);
        }

        let result = builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(write_error)?;

        Ok(result.rows_affected())
    }
}
