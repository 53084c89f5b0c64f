use reconcile_config::load_config;
use reconcile_config::shared::ReconcilerConfig;

use crate::Args;
use crate::error::{ReconcilerError, ReconcilerResult};

/// Loads the reconciler configuration, applies command line overrides and validates the result.
pub fn load_reconciler_config(args: &Args) -> ReconcilerResult<ReconcilerConfig> {
    let mut config = load_config::<ReconcilerConfig>().map_err(ReconcilerError::config)?;
    apply_overrides(&mut config, args);
    config.validate().map_err(ReconcilerError::config)?;

    Ok(config)
}

/// Overwrites run-level settings with the flags given on the command line.
fn apply_overrides(config: &mut ReconcilerConfig, args: &Args) {
    let pipeline = &mut config.pipeline;

    if let Some(report_date) = args.report_date {
        pipeline.report_date = report_date;
    }
    if args.dry_run {
        pipeline.dry_run = true;
    }
    if args.delete_existing {
        pipeline.delete_existing = true;
    }
    // Worker id 0 means an unpartitioned run.
    if let Some(worker_id) = args.worker_id {
        pipeline.partition_id = (worker_id != 0).then_some(worker_id);
    }
    if let Some(start_page) = args.start_page {
        pipeline.page_range.start_page = start_page;
    }
    if let Some(end_page) = args.end_page {
        pipeline.page_range.end_page = Some(end_page);
    }
    if let Some(timeout) = args.timeout {
        let timeout_ms = timeout.saturating_mul(1000);
        pipeline.remote.timeout_ms = timeout_ms;
        pipeline.relational.timeout_ms = timeout_ms;
    }
    if let Some(output_batch_size) = args.output_batch_size {
        pipeline.batch.max_size = output_batch_size;
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::NaiveDate;
    use clap::Parser;
    use reconcile_config::{Environment, load_config_from};
    use reconcile_config::shared::{
        DirectoryConfig, MySqlConnectionConfig, PipelineConfig, SinkConfig, SourceConfig,
    };

    use super::*;

    fn connection(name: &str) -> MySqlConnectionConfig {
        MySqlConnectionConfig {
            host: "localhost".to_string(),
            port: MySqlConnectionConfig::DEFAULT_PORT,
            name: name.to_string(),
            username: "reconciler".to_string(),
            password: None,
            max_connections: MySqlConnectionConfig::DEFAULT_MAX_CONNECTIONS,
        }
    }

    fn config() -> ReconcilerConfig {
        ReconcilerConfig {
            pipeline: PipelineConfig::new(NaiveDate::from_ymd_opt(2017, 2, 2).unwrap()),
            directory: DirectoryConfig {
                api_url: "http://localhost:8080".to_string(),
                request_timeout_ms: DirectoryConfig::DEFAULT_REQUEST_TIMEOUT_MS,
            },
            source: SourceConfig {
                connection: connection("users"),
                user_table: "user".to_string(),
                user_practice_table: "user_practice".to_string(),
            },
            sink: SinkConfig {
                connection: connection("reports"),
                match_table: "directory_match".to_string(),
                run_migrations: false,
            },
            metrics_port: None,
        }
    }

    #[test]
    fn flags_override_run_settings() {
        let args = Args::parse_from([
            "reconciler",
            "--dry-run",
            "--delete-existing",
            "--report-date",
            "2019-02-01",
            "--worker-id",
            "3",
            "--start-page",
            "10",
            "--end-page",
            "19",
            "--timeout",
            "2",
            "--output-batch-size",
            "500",
        ]);
        let mut config = config();

        apply_overrides(&mut config, &args);

        let pipeline = &config.pipeline;
        assert_eq!(
            pipeline.report_date,
            NaiveDate::from_ymd_opt(2019, 2, 1).unwrap()
        );
        assert!(pipeline.dry_run);
        assert!(pipeline.delete_existing);
        assert_eq!(pipeline.partition_id, Some(3));
        assert_eq!(pipeline.page_range.start_page, 10);
        assert_eq!(pipeline.page_range.end_page, Some(19));
        assert_eq!(pipeline.remote.timeout_ms, 2000);
        assert_eq!(pipeline.relational.timeout_ms, 2000);
        assert_eq!(pipeline.batch.max_size, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn worker_id_zero_runs_unpartitioned() {
        let args = Args::parse_from(["reconciler", "--worker-id", "0"]);
        let mut config = config();
        config.pipeline.partition_id = Some(4);

        apply_overrides(&mut config, &args);

        assert_eq!(config.pipeline.partition_id, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_flags_keep_configured_values() {
        let args = Args::parse_from(["reconciler"]);
        let mut config = config();
        let before = config.pipeline.clone();

        apply_overrides(&mut config, &args);

        assert_eq!(config.pipeline, before);
    }

    #[test]
    fn invalid_report_dates_are_rejected_by_the_parser() {
        assert!(Args::try_parse_from(["reconciler", "--report-date", "02/02/2017"]).is_err());
    }

    #[test]
    fn shipped_configuration_files_are_valid() {
        let directory = Path::new(env!("CARGO_MANIFEST_DIR")).join("configuration");

        for environment in [Environment::Dev, Environment::Prod] {
            let config = load_config_from::<ReconcilerConfig>(&directory, environment).unwrap();

            assert!(config.validate().is_ok(), "{environment} configuration");
            assert_eq!(
                config.pipeline.report_date,
                NaiveDate::from_ymd_opt(2017, 2, 2).unwrap()
            );
        }
    }
}
