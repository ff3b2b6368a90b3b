//! Query layer: turns request parameters into one search-backend query
//! document.
//!
//! ```text
//! Params ──► filter (FilterSpec::compile) ──► assemble ──► window guard
//!                                                │
//!                                  aggs::plan ───┘
//! ```
//!
//! The document model ([`Query`], [`Aggregation`], [`QueryDocument`]) is
//! typed; [`QueryDocument::to_json`] renders the backend wire format. All maps
//! are ordered, so compiling the same parameters twice yields identical
//! documents.

pub mod aggs;
pub mod assemble;
pub mod filter;
pub mod window;

use crate::config::SearchConfig;
use crate::surface::SearchSurface;
use crate::types::Params;
use serde::{Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

pub use filter::{CompiledFilters, EchoedFilter, FilterField, FilterSpec, FixedFilter, GeoField, NestingPath};
pub use window::WindowGuard;

// ---------------------------------------------------------------------------
// Query tree
// ---------------------------------------------------------------------------

/// The boolean filter tree sent to the backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    MatchAll,
    /// Free text, matched as a phrase prefix over `fields` (all fields when empty).
    MultiMatch { query: String, fields: Vec<String> },
    Match { field: String, value: Value },
    Bool { must: Vec<Query>, filter: Vec<Query> },
    /// Evaluates `query` within single objects of the nested document at `path`.
    Nested { path: String, query: Box<Query> },
    /// Documents whose point at `field` lies inside the polygon `points`;
    /// `kind` is the backend query name, normally `geo_polygon`.
    Geo { kind: String, field: String, points: Vec<Value> },
}

impl Query {
    pub fn match_value(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Query::Match {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Query::MatchAll => json!({ "match_all": {} }),
            Query::MultiMatch { query, fields } => {
                let mut body = Map::new();
                body.insert("query".into(), Value::String(query.clone()));
                body.insert("type".into(), Value::String("phrase_prefix".into()));
                if !fields.is_empty() {
                    body.insert("fields".into(), json!(fields));
                }
                json!({ "multi_match": body })
            }
            Query::Match { field, value } => {
                let mut body = Map::new();
                body.insert(field.clone(), value.clone());
                json!({ "match": body })
            }
            Query::Bool { must, filter } => {
                let mut body = Map::new();
                if !must.is_empty() {
                    body.insert("must".into(), Value::Array(must.iter().map(Query::to_json).collect()));
                }
                body.insert("filter".into(), Value::Array(filter.iter().map(Query::to_json).collect()));
                json!({ "bool": body })
            }
            Query::Nested { path, query } => json!({
                "nested": { "path": path, "query": query.to_json() }
            }),
            Query::Geo { kind, field, points } => {
                let mut shape = Map::new();
                shape.insert(field.clone(), json!({ "points": points }));
                let mut body = Map::new();
                body.insert(kind.clone(), Value::Object(shape));
                Value::Object(body)
            }
        }
    }

    /// Number of nested wrappers per path anywhere in the tree.
    pub fn nested_paths(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        self.count_nested(&mut counts);
        counts
    }

    fn count_nested(&self, counts: &mut BTreeMap<String, usize>) {
        match self {
            Query::Bool { must, filter } => {
                for q in must.iter().chain(filter.iter()) {
                    q.count_nested(counts);
                }
            }
            Query::Nested { path, query } => {
                *counts.entry(path.clone()).or_default() += 1;
                query.count_nested(counts);
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Sorting and aggregations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// One sort key; parsed from configuration where a leading `-` means descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub order: SortOrder,
}

impl SortField {
    pub fn parse(spec: &str) -> Self {
        match spec.strip_prefix('-') {
            Some(field) => Self { field: field.to_string(), order: SortOrder::Desc },
            None => Self { field: spec.to_string(), order: SortOrder::Asc },
        }
    }

    pub fn to_json(&self) -> Value {
        let order = match self.order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        let mut body = Map::new();
        body.insert(self.field.clone(), json!({ "order": order }));
        Value::Object(body)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// Distinct values ordered alphabetically, at most `size` buckets.
    Terms { field: String, size: u64 },
    /// Approximate distinct-value count.
    Cardinality { field: String, precision_threshold: u64 },
}

impl Aggregation {
    pub fn to_json(&self) -> Value {
        match self {
            Aggregation::Terms { field, size } => json!({
                "terms": { "field": field, "size": size, "order": { "_term": "asc" } }
            }),
            Aggregation::Cardinality { field, precision_threshold } => json!({
                "cardinality": { "field": field, "precision_threshold": precision_threshold }
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Query document
// ---------------------------------------------------------------------------

/// A complete search request body.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDocument {
    pub query: Query,
    pub aggs: Option<BTreeMap<String, Aggregation>>,
    pub sort: Vec<SortField>,
    pub size: Option<u64>,
    pub from: Option<u64>,
    /// When non-empty, only these source fields are returned.
    pub source_include: Vec<String>,
    pub source_exclude: Vec<String>,
}

impl QueryDocument {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            aggs: None,
            sort: Vec::new(),
            size: None,
            from: None,
            source_include: Vec::new(),
            source_exclude: Vec::new(),
        }
    }

    /// Drop page-style windowing; cursors iterate the full match set.
    pub fn strip_window(&mut self) {
        self.size = None;
        self.from = None;
    }

    pub fn to_json(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("query".into(), self.query.to_json());
        if let Some(aggs) = &self.aggs {
            let body: Map<String, Value> = aggs.iter().map(|(k, a)| (k.clone(), a.to_json())).collect();
            doc.insert("aggs".into(), Value::Object(body));
        }
        if !self.sort.is_empty() {
            doc.insert("sort".into(), Value::Array(self.sort.iter().map(SortField::to_json).collect()));
        }
        if let Some(size) = self.size {
            doc.insert("size".into(), json!(size));
        }
        if let Some(from) = self.from {
            doc.insert("from".into(), json!(from));
        }
        let mut source = Map::new();
        if !self.source_include.is_empty() {
            source.insert("include".into(), json!(self.source_include));
        }
        if !self.source_exclude.is_empty() {
            source.insert("exclude".into(), json!(self.source_exclude));
        }
        if !source.is_empty() {
            doc.insert("_source".into(), Value::Object(source));
        }
        Value::Object(doc)
    }
}

impl Serialize for QueryDocument {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ---------------------------------------------------------------------------
// Request compilation
// ---------------------------------------------------------------------------

/// A compiled request: the backend document plus the filter values to echo
/// back in the response.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub document: QueryDocument,
    pub echoed: Vec<EchoedFilter>,
}

/// Compile a paginated listing request: filters, facets, sort and window.
pub fn compile_listing(surface: &SearchSurface, params: &Params, search: &SearchConfig) -> CompiledQuery {
    let filters = surface.filter_spec.compile(params);
    let base = assemble::base_query(params.query_text(), &surface.text_fields);
    let mut document = QueryDocument::new(assemble::assemble(base, &filters));
    if !surface.facets.is_empty() {
        document.aggs = Some(aggs::plan(&surface.facets, search));
    }
    document.sort = surface.sort.clone();
    document.source_exclude = surface.source_exclude.clone();

    WindowGuard::from_config(search).apply(&mut document, params.get("page"));

    tracing::debug!(
        surface = %surface.name,
        index = %surface.index,
        filters = filters.clause_count(),
        size = ?document.size,
        from = ?document.from,
        "compiled listing query"
    );
    CompiledQuery {
        document,
        echoed: filters.echoed,
    }
}

/// Source field holding a document's map location.
pub const CENTROID_FIELD: &str = "centroid";

/// Compile a map request: the listing filters over the whole search window,
/// returning only each document's centroid. No facets, sort or paging.
pub fn compile_geolocation(surface: &SearchSurface, params: &Params, search: &SearchConfig) -> CompiledQuery {
    let filters = surface.filter_spec.compile(params);
    let base = assemble::base_query(params.query_text(), &surface.text_fields);
    let mut document = QueryDocument::new(assemble::assemble(base, &filters));
    document.size = Some(search.max_search_window);
    document.source_include = vec![CENTROID_FIELD.to_string()];

    tracing::debug!(
        surface = %surface.name,
        index = %surface.index,
        filters = filters.clause_count(),
        "compiled geolocation query"
    );
    CompiledQuery {
        document,
        echoed: filters.echoed,
    }
}

/// Compile an export request: filters only, no facets, sort or window.
pub fn compile_export(surface: &SearchSurface, params: &Params) -> CompiledQuery {
    let filters = surface.filter_spec.compile(params);
    let base = assemble::base_query(params.query_text(), &surface.text_fields);
    let mut document = QueryDocument::new(assemble::assemble(base, &filters));
    document.source_exclude = surface.source_exclude.clone();
    document.strip_window();

    tracing::debug!(
        surface = %surface.name,
        index = %surface.index,
        filters = filters.clause_count(),
        "compiled export query"
    );
    CompiledQuery {
        document,
        echoed: filters.echoed,
    }
}
