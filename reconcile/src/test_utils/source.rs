use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::bail;
use crate::error::{ErrorKind, ReconcileResult};
use crate::source::{DirectoryPage, DirectorySource, KeysetCursor, RelationalSource};
use crate::types::RelationalRecord;

/// Wraps a source and hangs forever once `calls_before_stall` fetches have been served.
///
/// Models an upstream that stops answering, which the merger must treat as exhaustion.
#[derive(Debug, Clone)]
pub struct StallingSource<S> {
    inner: S,
    calls_before_stall: usize,
    calls: Arc<AtomicUsize>,
}

impl<S> StallingSource<S> {
    pub fn new(inner: S, calls_before_stall: usize) -> Self {
        Self {
            inner,
            calls_before_stall,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of fetches attempted so far, stalled ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn stall_if_due(&self) {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.calls_before_stall {
            std::future::pending::<()>().await;
        }
    }
}

impl<S> DirectorySource for StallingSource<S>
where
    S: DirectorySource,
{
    fn name() -> &'static str {
        "stalling"
    }

    async fn fetch_page(&self, page: u32) -> ReconcileResult<DirectoryPage> {
        self.stall_if_due().await;
        self.inner.fetch_page(page).await
    }
}

impl<S> RelationalSource for StallingSource<S>
where
    S: RelationalSource,
{
    fn name() -> &'static str {
        "stalling"
    }

    async fn fetch_next(
        &self,
        cursor: &KeysetCursor,
        limit: usize,
    ) -> ReconcileResult<Vec<RelationalRecord>> {
        self.stall_if_due().await;
        self.inner.fetch_next(cursor, limit).await
    }

    async fn record_count(&self) -> ReconcileResult<u64> {
        self.inner.record_count().await
    }
}

/// Wraps a source and fails every fetch after `calls_before_failure` successful ones.
#[derive(Debug, Clone)]
pub struct FailingSource<S> {
    inner: S,
    calls_before_failure: usize,
    calls: Arc<AtomicUsize>,
}

impl<S> FailingSource<S> {
    pub fn new(inner: S, calls_before_failure: usize) -> Self {
        Self {
            inner,
            calls_before_failure,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failure_due(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst) >= self.calls_before_failure
    }
}

impl<S> DirectorySource for FailingSource<S>
where
    S: DirectorySource,
{
    fn name() -> &'static str {
        "failing"
    }

    async fn fetch_page(&self, page: u32) -> ReconcileResult<DirectoryPage> {
        if self.failure_due() {
            bail!(
                ErrorKind::SourceFetchFailed,
                "Directory request failed",
                format!("page {page}")
            );
        }

        self.inner.fetch_page(page).await
    }
}

impl<S> RelationalSource for FailingSource<S>
where
    S: RelationalSource,
{
    fn name() -> &'static str {
        "failing"
    }

    async fn fetch_next(
        &self,
        cursor: &KeysetCursor,
        limit: usize,
    ) -> ReconcileResult<Vec<RelationalRecord>> {
        if self.failure_due() {
            bail!(
                ErrorKind::SourceQueryFailed,
                "User table select failed",
                format!("after ({}, {})", cursor.lastname, cursor.id)
            );
        }

        self.inner.fetch_next(cursor, limit).await
    }

    async fn record_count(&self) -> ReconcileResult<u64> {
        self.inner.record_count().await
    }
}
