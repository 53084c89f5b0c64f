use serde::Deserialize;

use crate::Config;
use crate::shared::base::validate_table_name;
use crate::shared::{DirectoryConfig, MySqlConnectionConfig, PipelineConfig, ValidationError};

/// Relational source settings: the database holding the user and user-practice tables.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub connection: MySqlConnectionConfig,
    /// Fully-qualified user table name.
    #[serde(default = "default_user_table")]
    pub user_table: String,
    /// Fully-qualified user-practice table name, joined on `user.practice_id`.
    #[serde(default = "default_user_practice_table")]
    pub user_practice_table: String,
}

impl SourceConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate("source.connection")?;
        validate_table_name(&self.user_table)?;
        validate_table_name(&self.user_practice_table)
    }
}

fn default_user_table() -> String {
    "user".to_string()
}

fn default_user_practice_table() -> String {
    "user_practice".to_string()
}

/// Sink storage settings: the database receiving match records.
#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    pub connection: MySqlConnectionConfig,
    /// Fully-qualified match table name.
    #[serde(default = "default_match_table")]
    pub match_table: String,
    /// Apply the bundled migrations (which create `directory_match`) before the run.
    #[serde(default)]
    pub run_migrations: bool,
}

impl SinkConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.connection.validate("sink.connection")?;
        validate_table_name(&self.match_table)
    }
}

fn default_match_table() -> String {
    "directory_match".to_string()
}

/// Complete configuration for the reconciler binary.
///
/// This intentionally does not implement [`serde::Serialize`] to avoid leaking secrets.
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerConfig {
    pub pipeline: PipelineConfig,
    pub directory: DirectoryConfig,
    pub source: SourceConfig,
    pub sink: SinkConfig,
    /// Port of the Prometheus exporter. No exporter is installed when unset.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl ReconcilerConfig {
    /// Validates every section of the configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.pipeline.validate()?;
        self.directory.validate()?;
        self.source.validate()?;
        self.sink.validate()
    }
}

impl Config for ReconcilerConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
