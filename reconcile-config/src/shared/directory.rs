use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;
use crate::shared::base::ensure_non_zero;

/// Settings for the remote paginated user directory.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct DirectoryConfig {
    /// Base URL of the directory API, e.g. `https://vendor.example.com/api/v1`.
    pub api_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl DirectoryConfig {
    pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ValidationError::InvalidFieldValue {
                field: "directory.api_url".to_string(),
                constraint: "must be an http or https URL".to_string(),
            });
        }

        ensure_non_zero("directory.request_timeout_ms", self.request_timeout_ms)
    }
}

fn default_request_timeout_ms() -> u64 {
    DirectoryConfig::DEFAULT_REQUEST_TIMEOUT_MS
}
