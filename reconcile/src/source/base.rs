use std::future::Future;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ReconcileResult;
use crate::types::RelationalRecord;

/// Fixed number of users per remote directory page.
pub const DIRECTORY_PAGE_SIZE: u64 = 1000;

/// Page number far past the end of any directory, used to read `total_pages` cheaply.
pub const EMPTY_PAGE_NUMBER: u32 = 100_000;

/// A user as served by the remote directory, before provenance is attached.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DirectoryUser {
    pub id: u64,
    pub firstname: String,
    pub lastname: String,
    pub practice_location: String,
    pub specialty: String,
    #[serde(rename = "user_type_classification")]
    pub classification: String,
    pub last_active_date: NaiveDate,
}

/// One page of the remote directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryPage {
    pub current_page: u32,
    pub total_pages: u32,
    /// Users of this page in ascending lastname order. Empty past the last page.
    pub users: Vec<DirectoryUser>,
}

/// Remote paginated user directory, ordered by lastname across pages.
pub trait DirectorySource: Send + Sync {
    /// Returns the name of the source, used in logs and metrics.
    fn name() -> &'static str;

    /// Fetches one page by its 1-based number.
    ///
    /// A page past the end returns no users; this is how end-of-stream is detected.
    fn fetch_page(&self, page: u32) -> impl Future<Output = ReconcileResult<DirectoryPage>> + Send;

    /// Returns the number of pages the directory currently serves.
    fn page_count(&self) -> impl Future<Output = ReconcileResult<u32>> + Send {
        async move {
            let page = self.fetch_page(EMPTY_PAGE_NUMBER).await?;
            Ok(page.total_pages)
        }
    }
}

/// Keyset position in the relational table: the last `(lastname, id)` returned.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeysetCursor {
    pub lastname: String,
    pub id: u64,
}

impl KeysetCursor {
    /// Cursor positioned right before the first row whose lastname is `lastname`.
    pub fn starting_at(lastname: &str) -> Self {
        Self {
            lastname: lastname.to_string(),
            id: 0,
        }
    }
}

/// Relational user table, read in `(lastname, id)` order.
pub trait RelationalSource: Send + Sync {
    fn name() -> &'static str;

    /// Returns up to `limit` records strictly after `cursor` in `(lastname, id)` order, i.e.
    /// `lastname > cursor.lastname OR (lastname = cursor.lastname AND id > cursor.id)`.
    fn fetch_next(
        &self,
        cursor: &KeysetCursor,
        limit: usize,
    ) -> impl Future<Output = ReconcileResult<Vec<RelationalRecord>>> + Send;

    /// Returns the total number of users in the table.
    fn record_count(&self) -> impl Future<Output = ReconcileResult<u64>> + Send;
}
