use reconcile_config::shared::PageRangeConfig;
use tracing::{debug, info};

use crate::error::ReconcileResult;
use crate::source::{DirectorySource, KeysetCursor, RelationalSource};
use crate::types::{LastnameKey, RelationalRecord, RemoteProvenance, RemoteRecord};
use crate::workers::BatchFetcher;

/// Page-numbered fetcher over a [`DirectorySource`].
///
/// Walks pages from the configured start page until an empty page, or until the configured end
/// page has been fetched. Every record gets its 1-based page and row as provenance.
#[derive(Debug)]
pub struct DirectoryPager<S> {
    source: S,
    next_page: u32,
    end_page: Option<u32>,
    finished: bool,
}

impl<S> DirectoryPager<S> {
    pub fn new(source: S, page_range: &PageRangeConfig) -> Self {
        Self {
            source,
            next_page: page_range.start_page,
            end_page: page_range.end_page,
            finished: false,
        }
    }
}

impl<S> BatchFetcher for DirectoryPager<S>
where
    S: DirectorySource + 'static,
{
    type Record = RemoteRecord;

    /// Fetches the next page. The directory serves fixed-size pages, so `limit` is ignored.
    async fn fetch_next(&mut self, _limit: usize) -> ReconcileResult<Vec<RemoteRecord>> {
        if self.finished {
            return Ok(Vec::new());
        }

        let page = self.source.fetch_page(self.next_page).await?;

        let (Some(first), Some(last)) = (page.users.first(), page.users.last()) else {
            info!(page = self.next_page, "directory page is empty, paging finished");
            self.finished = true;
            return Ok(Vec::new());
        };

        info!(
            page = page.current_page,
            total_pages = page.total_pages,
            users = page.users.len(),
            first = %first.lastname,
            last = %last.lastname,
            "fetched directory page"
        );

        let current_page = page.current_page;
        let records = page
            .users
            .into_iter()
            .enumerate()
            .map(|(index, user)| RemoteRecord {
                id: user.id,
                firstname: user.firstname,
                lastname: user.lastname,
                practice_location: user.practice_location,
                specialty: user.specialty,
                classification: user.classification,
                last_active_date: user.last_active_date,
                provenance: RemoteProvenance {
                    page: current_page,
                    row: index as u32 + 1,
                },
            })
            .collect();

        self.next_page += 1;
        if let Some(end_page) = self.end_page
            && self.next_page > end_page
        {
            info!(end_page, "reached configured end page");
            self.finished = true;
        }

        Ok(records)
    }
}

/// Keyset fetcher over a [`RelationalSource`] ordered by `(lastname, id)`.
///
/// Ends on an empty result, a short result, or a result that does not move the cursor forward.
#[derive(Debug)]
pub struct KeysetScanner<S> {
    source: S,
    cursor: KeysetCursor,
    finished: bool,
}

impl<S> KeysetScanner<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cursor: KeysetCursor::default(),
            finished: false,
        }
    }

    pub fn cursor(&self) -> &KeysetCursor {
        &self.cursor
    }
}

impl<S> BatchFetcher for KeysetScanner<S>
where
    S: RelationalSource + 'static,
{
    type Record = RelationalRecord;

    async fn fetch_next(&mut self, limit: usize) -> ReconcileResult<Vec<RelationalRecord>> {
        if self.finished {
            return Ok(Vec::new());
        }

        let records = self.source.fetch_next(&self.cursor, limit).await?;

        let Some(last) = records.last() else {
            info!("user table select came up empty, scan finished");
            self.finished = true;
            return Ok(Vec::new());
        };

        let next_cursor = KeysetCursor {
            lastname: last.lastname.clone(),
            id: last.id,
        };
        if next_cursor == self.cursor {
            info!(id = last.id, "keyset cursor did not advance, scan finished");
            self.finished = true;
            return Ok(Vec::new());
        }

        info!(
            records = records.len(),
            first = %records[0].lastname,
            last = %last.lastname,
            "selected users"
        );

        if records.len() < limit {
            debug!("short batch, no rows left after this one");
            self.finished = true;
        }
        self.cursor = next_cursor;

        Ok(records)
    }

    /// Moves the cursor right before the first row with lastname `key`.
    fn set_start_key(&mut self, key: &LastnameKey) {
        self.cursor = KeysetCursor::starting_at(key.as_str());
    }
}
