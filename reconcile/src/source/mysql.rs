use chrono::NaiveDate;
use reconcile_config::shared::MySqlConnectionConfig;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::{debug, info};

use crate::error::ReconcileResult;
use crate::source::{KeysetCursor, RelationalSource};
use crate::types::RelationalRecord;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: u64,
    firstname: String,
    lastname: String,
    classification: String,
    specialty: String,
    location: String,
    last_active_date: NaiveDate,
}

impl From<UserRow> for RelationalRecord {
    fn from(row: UserRow) -> Self {
        RelationalRecord {
            id: row.id,
            firstname: row.firstname,
            lastname: row.lastname,
            location: row.location,
            specialty: row.specialty,
            classification: row.classification,
            last_active_date: row.last_active_date,
        }
    }
}

/// Relational user source backed by MySQL.
///
/// Reads the user table joined with the user-practice table using keyset pagination over
/// `(lastname, id)`.
#[derive(Debug, Clone)]
pub struct MySqlUserSource {
    pool: MySqlPool,
    select_sql: String,
    count_sql: String,
}

impl MySqlUserSource {
    /// Creates a source over already validated table names.
    pub fn new(pool: MySqlPool, user_table: &str, user_practice_table: &str) -> Self {
        let select_sql = format!(
            r#"
            select cast(u.id as unsigned) as id,
                   u.firstname,
                   u.lastname,
                   u.classification,
                   u.specialty,
                   p.location,
                   u.last_active_date
              from {user_table} as u
             inner join {user_practice_table} as p
                on u.practice_id = p.id
             where u.lastname > ?
                or (u.lastname = ? and u.id > ?)
             order by u.lastname, u.id
             limit ?
            "#
        );
        let count_sql = format!("select count(*) from {user_table}");

        Self {
            pool,
            select_sql,
            count_sql,
        }
    }
}

/// Connects a pool to the source database.
pub async fn connect_source_pool(config: &MySqlConnectionConfig) -> ReconcileResult<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(config.with_db())
        .await?;

    info!(host = %config.host, database = %config.name, "connected to source database");

    Ok(pool)
}

impl RelationalSource for MySqlUserSource {
    fn name() -> &'static str {
        "mysql"
    }

    async fn fetch_next(
        &self,
        cursor: &KeysetCursor,
        limit: usize,
    ) -> ReconcileResult<Vec<RelationalRecord>> {
        debug!(lastname = %cursor.lastname, id = cursor.id, limit, "querying user table");

        let rows: Vec<UserRow> = sqlx::query_as(&self.select_sql)
            .bind(&cursor.lastname)
            .bind(&cursor.lastname)
            .bind(cursor.id)
            .bind(limit as u64)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn record_count(&self) -> ReconcileResult<u64> {
        let count: i64 = sqlx::query_scalar(&self.count_sql)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }
}
