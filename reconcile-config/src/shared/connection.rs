use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::mysql::MySqlConnectOptions;

use crate::shared::ValidationError;
use crate::shared::base::ensure_non_zero;

/// Connection settings for a MySQL database.
///
/// This intentionally does not implement [`serde::Serialize`] so the password cannot leak into
/// serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct MySqlConnectionConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database (schema) name.
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub password: Option<SecretString>,
    /// Upper bound on pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl MySqlConnectionConfig {
    pub const DEFAULT_PORT: u16 = 3306;

    pub const DEFAULT_MAX_CONNECTIONS: u32 = 2;

    /// Builds `sqlx` connect options for the configured database.
    pub fn with_db(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .database(&self.name)
            .charset("utf8mb4");

        if let Some(password) = &self.password {
            options = options.password(password.expose_secret());
        }

        options
    }

    pub fn validate(&self, field: &str) -> Result<(), ValidationError> {
        ensure_non_zero(
            &format!("{field}.max_connections"),
            self.max_connections as u64,
        )
    }
}

fn default_port() -> u16 {
    MySqlConnectionConfig::DEFAULT_PORT
}

fn default_max_connections() -> u32 {
    MySqlConnectionConfig::DEFAULT_MAX_CONNECTIONS
}
