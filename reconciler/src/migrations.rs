use sqlx::MySqlPool;
use sqlx::migrate::MigrateError;
use tracing::info;

/// DDL of the match table, as applied by the bundled migration.
pub const MATCH_TABLE_DDL: &str =
    include_str!("../migrations/20170202000000_create_directory_match.sql");

/// Runs the bundled migrations against the sink database.
///
/// Creates `directory_match` when it does not exist yet. Runs configured with a different match
/// table are expected to provision it themselves.
pub async fn migrate_sink(pool: &MySqlPool) -> Result<(), MigrateError> {
    let migrator = sqlx::migrate!("./migrations");
    migrator.run(pool).await?;

    info!("sink migrations applied");

    Ok(())
}
