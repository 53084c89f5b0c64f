use reconcile_config::shared::DirectoryConfig;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, error};

use crate::bail;
use crate::error::{ErrorKind, ReconcileResult};
use crate::source::{DirectoryPage, DirectorySource, DirectoryUser};

/// Response body of `GET /users?page={n}`.
#[derive(Debug, Deserialize)]
struct UsersPageBody {
    current_page: u32,
    total_pages: u32,
    users: Vec<DirectoryUser>,
}

/// Remote directory served over HTTP as JSON pages.
#[derive(Debug, Clone)]
pub struct HttpDirectorySource {
    client: Client,
    users_url: String,
}

impl HttpDirectorySource {
    /// Creates a client for the directory rooted at `config.api_url`.
    pub fn new(config: &DirectoryConfig) -> ReconcileResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self::with_client(client, &config.api_url))
    }

    /// Creates a source from an existing client.
    pub fn with_client(client: Client, api_url: &str) -> Self {
        Self {
            client,
            users_url: users_url(api_url),
        }
    }
}

fn users_url(api_url: &str) -> String {
    format!("{}/users", api_url.trim_end_matches('/'))
}

impl DirectorySource for HttpDirectorySource {
    fn name() -> &'static str {
        "http"
    }

    async fn fetch_page(&self, page: u32) -> ReconcileResult<DirectoryPage> {
        debug!(url = %self.users_url, page, "requesting directory page");

        let response = self
            .client
            .get(&self.users_url)
            .query(&[("page", page)])
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            error!(%status, page, "directory returned an error status");
            bail!(
                ErrorKind::SourceFetchFailed,
                "Directory returned a non-success status",
                format!("status {status} for page {page}: {body}")
            );
        }

        let body: UsersPageBody = response.json().await?;

        debug!(
            current_page = body.current_page,
            total_pages = body.total_pages,
            users = body.users.len(),
            "received directory page"
        );

        Ok(DirectoryPage {
            current_page: body.current_page,
            total_pages: body.total_pages,
            users: body.users,
        })
    }
}
