use reconcile::metrics::register_metrics;
use reconcile::pipeline::{Pipeline, RunSummary};
use reconcile::sink::MatchStore;
use reconcile::sink::memory::MemoryMatchStore;
use reconcile::sink::mysql::{MySqlMatchStore, connect_sink_pool};
use reconcile::source::http::HttpDirectorySource;
use reconcile::source::mysql::{MySqlUserSource, connect_source_pool};
use reconcile_config::shared::{
    BatchConfig, DirectoryConfig, MySqlConnectionConfig, PipelineConfig, QueueConfig,
    ReconcilerConfig,
};
use reconcile_telemetry::metrics::init_metrics;
use tracing::{debug, info};

use crate::error::{ReconcilerError, ReconcilerResult};
use crate::migrations::migrate_sink;

/// Runs one reconciliation with the provided configuration.
///
/// Dry runs use an in-memory sink and never connect to the sink database.
pub async fn run_reconciler(config: ReconcilerConfig) -> ReconcilerResult<RunSummary> {
    info!("starting reconciler");

    register_metrics();
    if let Some(port) = config.metrics_port {
        init_metrics(port, config.pipeline.partition_id).map_err(ReconcilerError::config)?;
    }

    log_config(&config);

    let directory = HttpDirectorySource::new(&config.directory)?;
    let source_pool = connect_source_pool(&config.source.connection).await?;
    let relational = MySqlUserSource::new(
        source_pool,
        &config.source.user_table,
        &config.source.user_practice_table,
    );

    // Each store is a distinct type, so the pipeline is built once per branch.
    let summary = if config.pipeline.dry_run {
        info!("dry run, match records are kept in memory");

        let store = MemoryMatchStore::new();
        start_pipeline(Pipeline::new(config.pipeline, directory, relational, store)).await?
    } else {
        let sink_pool = connect_sink_pool(&config.sink.connection).await?;
        if config.sink.run_migrations {
            migrate_sink(&sink_pool).await?;
        }

        let store = MySqlMatchStore::new(sink_pool, config.sink.match_table);
        start_pipeline(Pipeline::new(config.pipeline, directory, relational, store)).await?
    };

    info!("reconciler completed");

    Ok(summary)
}

#[tracing::instrument(skip(pipeline))]
async fn start_pipeline<S>(
    pipeline: Pipeline<HttpDirectorySource, MySqlUserSource, S>,
) -> ReconcilerResult<RunSummary>
where
    S: MatchStore,
{
    let summary = pipeline.run().await?;

    info!(
        groups = summary.merge.groups_emitted,
        matches = summary.engine.matches,
        termination = %summary.merge.termination,
        "pipeline finished"
    );

    Ok(summary)
}

fn log_config(config: &ReconcilerConfig) {
    log_pipeline_config(&config.pipeline);
    log_directory_config(&config.directory);
    log_connection_config("source", &config.source.connection);
    debug!(
        user_table = config.source.user_table,
        user_practice_table = config.source.user_practice_table,
        "source tables"
    );
    log_connection_config("sink", &config.sink.connection);
    debug!(
        match_table = config.sink.match_table,
        run_migrations = config.sink.run_migrations,
        "sink table"
    );
}

fn log_pipeline_config(config: &PipelineConfig) {
    debug!(
        report_date = %config.report_date,
        partition_id = config.partition_id,
        dry_run = config.dry_run,
        delete_existing = config.delete_existing,
        start_page = config.page_range.start_page,
        end_page = config.page_range.end_page,
        "pipeline config"
    );
    log_queue_config("remote", &config.remote);
    log_queue_config("relational", &config.relational);
    log_batch_config(&config.batch);
}

fn log_queue_config(side: &str, config: &QueueConfig) {
    debug!(
        side,
        capacity = config.capacity,
        batch_fetch_size = config.batch_fetch_size,
        timeout_ms = config.timeout_ms,
        working_data_percent = config.working_data_percent,
        "queue config"
    );
}

fn log_batch_config(config: &BatchConfig) {
    debug!(max_size = config.max_size, "batch config");
}

fn log_directory_config(config: &DirectoryConfig) {
    debug!(
        api_url = config.api_url,
        request_timeout_ms = config.request_timeout_ms,
        "directory config"
    );
}

fn log_connection_config(role: &str, config: &MySqlConnectionConfig) {
    debug!(
        role,
        host = config.host,
        port = config.port,
        dbname = config.name,
        username = config.username,
        max_connections = config.max_connections,
        "mysql connection config"
    );
}
