use std::cmp::Ordering;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::ReconcileResult;
use crate::source::{DirectoryPage, DirectorySource, DirectoryUser, KeysetCursor, RelationalSource};
use crate::types::RelationalRecord;

/// In-memory remote directory for tests and local dry runs.
///
/// Users are split into pages of a fixed size in the order given. Every requested page number is
/// recorded so tests can assert on the paging pattern.
#[derive(Debug, Clone)]
pub struct MemoryDirectory {
    pages: Arc<Vec<Vec<DirectoryUser>>>,
    requested_pages: Arc<Mutex<Vec<u32>>>,
}

impl MemoryDirectory {
    /// Creates a directory serving `users` in pages of `page_size`.
    pub fn new(users: Vec<DirectoryUser>, page_size: usize) -> Self {
        let pages = users
            .chunks(page_size.max(1))
            .map(<[DirectoryUser]>::to_vec)
            .collect();

        Self {
            pages: Arc::new(pages),
            requested_pages: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns every page number requested so far, in request order.
    pub async fn requested_pages(&self) -> Vec<u32> {
        self.requested_pages.lock().await.clone()
    }
}

impl DirectorySource for MemoryDirectory {
    fn name() -> &'static str {
        "memory"
    }

    async fn fetch_page(&self, page: u32) -> ReconcileResult<DirectoryPage> {
        self.requested_pages.lock().await.push(page);

        let users = (page as usize)
            .checked_sub(1)
            .and_then(|index| self.pages.get(index))
            .cloned()
            .unwrap_or_default();

        Ok(DirectoryPage {
            current_page: page,
            total_pages: self.pages.len() as u32,
            users,
        })
    }
}

/// In-memory relational user table for tests and local dry runs.
///
/// Rows are kept sorted by `(lastname, id)` with lastnames compared case-insensitively, which is
/// how the MySQL collation orders them.
#[derive(Debug, Clone)]
pub struct MemoryUserTable {
    rows: Arc<Vec<RelationalRecord>>,
    queries: Arc<Mutex<Vec<KeysetCursor>>>,
}

impl MemoryUserTable {
    pub fn new(mut rows: Vec<RelationalRecord>) -> Self {
        rows.sort_by(|a, b| compare_keyset(&a.lastname, a.id, &b.lastname, b.id));

        Self {
            rows: Arc::new(rows),
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the cursor of every query issued so far.
    pub async fn queries(&self) -> Vec<KeysetCursor> {
        self.queries.lock().await.clone()
    }
}

fn compare_keyset(lastname: &str, id: u64, other_lastname: &str, other_id: u64) -> Ordering {
    lastname
        .to_lowercase()
        .cmp(&other_lastname.to_lowercase())
        .then(id.cmp(&other_id))
}

impl RelationalSource for MemoryUserTable {
    fn name() -> &'static str {
        "memory"
    }

    async fn fetch_next(
        &self,
        cursor: &KeysetCursor,
        limit: usize,
    ) -> ReconcileResult<Vec<RelationalRecord>> {
        self.queries.lock().await.push(cursor.clone());

        Ok(self
            .rows
            .iter()
            .filter(|row| {
                compare_keyset(&row.lastname, row.id, &cursor.lastname, cursor.id)
                    == Ordering::Greater
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn record_count(&self) -> ReconcileResult<u64> {
        Ok(self.rows.len() as u64)
    }
}
