//! Test builders: search documents, record-store rows and whole corpora.
//!
//! These builders are designed for readability in test assertions, not for
//! production use. They panic on invalid input rather than returning `Result`.

use ds_backends::{MemoryIndex, MemoryRecordStore};
use ds_core::config::{Config, SearchConfig};
use ds_core::surface::{SearchSurface, Surfaces};
use ds_core::types::{FieldValue, Hit, Record};
use serde_json::{Map, Value};
use std::sync::Arc;

// ---------------------------------------------------------------------------
// DocBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for a search-backend document.
///
/// ```rust
/// let hit = DocBuilder::new("42")
///     .field("dataset", "hr")
///     .nested("sbi_codes", vec![json!({ "sbi_code": "1071" })])
///     .build();
/// ```
pub struct DocBuilder {
    id: String,
    source: Map<String, Value>,
}

impl DocBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: Map::new(),
        }
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.source.insert(key.to_string(), value.into());
        self
    }

    pub fn nested(mut self, path: &str, objects: Vec<Value>) -> Self {
        self.source.insert(path.to_string(), Value::Array(objects));
        self
    }

    pub fn build(self) -> Hit {
        Hit {
            id: self.id,
            source: self.source,
        }
    }
}

// ---------------------------------------------------------------------------
// CorpusBuilder
// ---------------------------------------------------------------------------

/// Builds a [`MemoryIndex`] and a [`MemoryRecordStore`] side by side, so each
/// indexed document has its system-of-record row under the same id.
#[derive(Default)]
pub struct CorpusBuilder {
    index: MemoryIndex,
    store: MemoryRecordStore,
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `hit` and store `record`; both must carry the same id.
    pub fn pair(mut self, index: &str, model: &str, hit: Hit, record: Record) -> Self {
        assert_eq!(hit.id, record.id, "document and record ids differ");
        self.index.insert(index, hit);
        self.store.insert(model, record);
        self
    }

    /// Index a document without a system-of-record row.
    pub fn orphan(mut self, index: &str, hit: Hit) -> Self {
        self.index.insert(index, hit);
        self
    }

    /// Store a record without indexing it.
    pub fn unindexed(mut self, model: &str, record: Record) -> Self {
        self.store.insert(model, record);
        self
    }

    pub fn failing_cursors_after(mut self, pages: usize) -> Self {
        self.index = self.index.failing_cursors_after(pages);
        self
    }

    pub fn build(self) -> (MemoryIndex, MemoryRecordStore) {
        (self.index, self.store)
    }
}

// ---------------------------------------------------------------------------
// Surfaces and config
// ---------------------------------------------------------------------------

pub fn surfaces() -> Surfaces {
    Surfaces::from_config(&Config::defaults()).expect("built-in surfaces compile")
}

pub fn surface(name: &str) -> Arc<SearchSurface> {
    surfaces().get(name).expect("built-in surface exists")
}

pub fn search_config(preview_size: u64) -> SearchConfig {
    SearchConfig {
        preview_size,
        ..SearchConfig::default()
    }
}

/// Record with the given fields, values converted like fixture JSON.
pub fn record(id: &str, fields: &[(&str, Value)]) -> Record {
    let mut record = Record::new(id);
    for (k, v) in fields {
        record.fields.insert((*k).to_string(), FieldValue::from_json_guess(v));
    }
    record
}
