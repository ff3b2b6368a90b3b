//! Collaborator interfaces: the search backend, its export cursor and the
//! system-of-record store.
//!
//! Implementations are long-lived and shared across requests behind `Arc`;
//! the pipeline never mutates them.

use crate::error::{SearchError, StoreError};
use crate::query::{QueryDocument, SortField};
use crate::types::{Hit, Record, SearchResults};
use async_trait::async_trait;

#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Execute one windowed search.
    async fn search(&self, index: &str, document: &QueryDocument) -> Result<SearchResults, SearchError>;

    /// Open a cursor over the full match set of `document`, delivering at
    /// most `page_size` hits per page. Any window on `document` is ignored.
    async fn open_cursor(
        &self,
        index: &str,
        document: &QueryDocument,
        page_size: usize,
    ) -> Result<Box<dyn ExportCursor>, SearchError>;
}

/// Resumable handle over an unbounded match set.
///
/// Dropping a cursor releases it; [`ExportCursor::close`] does the same
/// explicitly and reports failures.
#[async_trait]
pub trait ExportCursor: Send {
    /// Next page of hits; an empty page means the cursor is exhausted.
    async fn next_page(&mut self) -> Result<Vec<Hit>, SearchError>;

    async fn close(self: Box<Self>) -> Result<(), SearchError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load the records of `model` whose ids are in `ids`. Unknown ids are
    /// silently omitted. With an empty `order` the store's natural order is
    /// returned, which need not match the order of `ids`.
    async fn find_by_ids(&self, model: &str, ids: &[String], order: &[SortField]) -> Result<Vec<Record>, StoreError>;
}
