//! In-memory system-of-record store.

use async_trait::async_trait;
use ds_core::backend::RecordStore;
use ds_core::error::StoreError;
use ds_core::query::{SortField, SortOrder};
use ds_core::types::{FieldValue, Record};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct Lookups {
    count: AtomicUsize,
    batch_sizes: Mutex<Vec<usize>>,
}

/// Records per model, kept in insertion ("natural") order.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    models: BTreeMap<String, Vec<Record>>,
    lookups: Arc<Lookups>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, model: impl Into<String>, record: Record) {
        self.models.entry(model.into()).or_default().push(record);
    }

    pub fn with_record(mut self, model: impl Into<String>, record: Record) -> Self {
        self.insert(model, record);
        self
    }

    /// Number of `find_by_ids` calls so far.
    pub fn lookups(&self) -> usize {
        self.lookups.count.load(AtomicOrdering::SeqCst)
    }

    /// Identifier count of every `find_by_ids` call, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.lookups
            .batch_sizes
            .lock()
            .map(|sizes| sizes.clone())
            .unwrap_or_default()
    }
}

static NULL: FieldValue = FieldValue::Null;

/// `id` falls back to the record's primary identifier.
fn sort_value<'a>(record: &'a Record, field: &str, id: &'a FieldValue) -> &'a FieldValue {
    match record.get(field) {
        Some(v) => v,
        None if field == "id" => id,
        None => &NULL,
    }
}

fn compare_records(a: &Record, b: &Record, order: &[SortField]) -> Ordering {
    let (a_id, b_id) = (FieldValue::Text(a.id.clone()), FieldValue::Text(b.id.clone()));
    for key in order {
        let x = sort_value(a, &key.field, &a_id);
        let y = sort_value(b, &key.field, &b_id);
        let ord = match key.order {
            SortOrder::Asc => x.sort_cmp(y),
            SortOrder::Desc => y.sort_cmp(x),
        };
        if ord.is_ne() {
            return ord;
        }
    }
    Ordering::Equal
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn find_by_ids(&self, model: &str, ids: &[String], order: &[SortField]) -> Result<Vec<Record>, StoreError> {
        self.lookups.count.fetch_add(1, AtomicOrdering::SeqCst);
        if let Ok(mut sizes) = self.lookups.batch_sizes.lock() {
            sizes.push(ids.len());
        }

        let records = self
            .models
            .get(model)
            .ok_or_else(|| StoreError::UnknownModel(model.to_string()))?;
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut found: Vec<Record> = records
            .iter()
            .filter(|r| wanted.contains(r.id.as_str()))
            .cloned()
            .collect();
        if !order.is_empty() {
            found.sort_by(|a, b| compare_records(a, b, order));
        }
        Ok(found)
    }
}
