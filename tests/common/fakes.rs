//! Fault-injecting collaborators.

use async_trait::async_trait;
use ds_backends::MemoryRecordStore;
use ds_core::backend::RecordStore;
use ds_core::error::StoreError;
use ds_core::query::SortField;
use ds_core::types::Record;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Record store whose `fail_on`-th lookup (1-based) fails.
pub struct FlakyRecordStore {
    inner: MemoryRecordStore,
    fail_on: usize,
    calls: AtomicUsize,
}

impl FlakyRecordStore {
    pub fn new(inner: MemoryRecordStore, fail_on: usize) -> Self {
        Self {
            inner,
            fail_on,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FlakyRecordStore {
    async fn find_by_ids(&self, model: &str, ids: &[String], order: &[SortField]) -> Result<Vec<Record>, StoreError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call == self.fail_on {
            return Err(StoreError::Unavailable("connection reset by peer".to_string()));
        }
        self.inner.find_by_ids(model, ids, order).await
    }
}
