//! In-process search backend.
//!
//! [`MemoryIndex`] evaluates the query documents this pipeline emits against
//! JSON documents held in memory: `match` (exact on `.raw` fields,
//! case-insensitive otherwise), `multi_match` phrase prefixes, `bool` and
//! per-object `nested` evaluation, `geo_polygon` point-in-polygon tests,
//! sorting, windowing, `_source` include and exclude, `terms` and
//! `cardinality` aggregations. It backs the test suites and the `--data`
//! mode of the binary.

use async_trait::async_trait;
use geo::{Contains, LineString, Point, Polygon};
use ds_core::backend::{ExportCursor, SearchBackend};
use ds_core::error::SearchError;
use ds_core::query::{Aggregation, Query, QueryDocument, SortField, SortOrder};
use ds_core::types::{Hit, SearchResults};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Backend default when a document carries no `size`.
const DEFAULT_SIZE: u64 = 10;
const RAW_SUFFIX: &str = ".raw";

#[derive(Debug, Default)]
struct Counters {
    searches: AtomicUsize,
    cursors_opened: AtomicUsize,
    open_cursors: AtomicUsize,
    pages_served: AtomicUsize,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryIndex {
    indices: HashMap<String, Vec<Hit>>,
    counters: Arc<Counters>,
    /// Cursor pages served before `next_page` starts failing.
    fail_cursor_after: Option<usize>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: impl Into<String>, hit: Hit) {
        self.indices.entry(index.into()).or_default().push(hit);
    }

    pub fn with_document(mut self, index: impl Into<String>, hit: Hit) -> Self {
        self.insert(index, hit);
        self
    }

    /// Make every cursor fail once it has served `pages` pages.
    pub fn failing_cursors_after(mut self, pages: usize) -> Self {
        self.fail_cursor_after = Some(pages);
        self
    }

    pub fn len(&self, index: &str) -> usize {
        self.indices.get(index).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.indices.values().all(Vec::is_empty)
    }

    pub fn searches(&self) -> usize {
        self.counters.searches.load(AtomicOrdering::SeqCst)
    }

    pub fn cursors_opened(&self) -> usize {
        self.counters.cursors_opened.load(AtomicOrdering::SeqCst)
    }

    /// Cursors opened and not yet closed or dropped.
    pub fn open_cursors(&self) -> usize {
        self.counters.open_cursors.load(AtomicOrdering::SeqCst)
    }

    pub fn pages_served(&self) -> usize {
        self.counters.pages_served.load(AtomicOrdering::SeqCst)
    }

    fn documents(&self, index: &str) -> Result<&[Hit], SearchError> {
        self.indices
            .get(index)
            .map(Vec::as_slice)
            .ok_or_else(|| SearchError::Status {
                status: 404,
                body: format!("no such index [{index}]"),
            })
    }

    fn matching<'a>(&self, docs: &'a [Hit], document: &QueryDocument) -> Vec<&'a Hit> {
        let mut matched: Vec<&Hit> = docs
            .iter()
            .filter(|hit| matches(&document.query, &Scope::root(&hit.source)))
            .collect();
        if !document.sort.is_empty() {
            matched.sort_by(|a, b| compare_hits(a, b, &document.sort));
        }
        matched
    }
}

fn project(hit: &Hit, document: &QueryDocument) -> Hit {
    let mut out = hit.clone();
    if !document.source_include.is_empty() {
        out.source.retain(|field, _| document.source_include.contains(field));
    }
    for field in &document.source_exclude {
        out.source.remove(field);
    }
    out
}

#[async_trait]
impl SearchBackend for MemoryIndex {
    async fn search(&self, index: &str, document: &QueryDocument) -> Result<SearchResults, SearchError> {
        self.counters.searches.fetch_add(1, AtomicOrdering::SeqCst);
        let docs = self.documents(index)?;
        let matched = self.matching(docs, document);

        let from = usize::try_from(document.from.unwrap_or(0)).unwrap_or(usize::MAX);
        let size = document.size.unwrap_or(DEFAULT_SIZE) as usize;
        let hits = matched
            .iter()
            .skip(from)
            .take(size)
            .map(|h| project(h, document))
            .collect();
        let aggregations = document.aggs.as_ref().map(|aggs| aggregate(aggs, &matched));

        Ok(SearchResults {
            total: matched.len() as u64,
            hits,
            aggregations,
        })
    }

    async fn open_cursor(
        &self,
        index: &str,
        document: &QueryDocument,
        page_size: usize,
    ) -> Result<Box<dyn ExportCursor>, SearchError> {
        let docs = self.documents(index)?;
        let remaining: VecDeque<Hit> = self
            .matching(docs, document)
            .into_iter()
            .map(|h| project(h, document))
            .collect();

        self.counters.cursors_opened.fetch_add(1, AtomicOrdering::SeqCst);
        self.counters.open_cursors.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(Box::new(MemoryCursor {
            remaining,
            page_size: page_size.max(1),
            served: 0,
            fail_after: self.fail_cursor_after,
            counters: Arc::clone(&self.counters),
        }))
    }
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

struct MemoryCursor {
    remaining: VecDeque<Hit>,
    page_size: usize,
    served: usize,
    fail_after: Option<usize>,
    counters: Arc<Counters>,
}

#[async_trait]
impl ExportCursor for MemoryCursor {
    async fn next_page(&mut self) -> Result<Vec<Hit>, SearchError> {
        if self.fail_after.is_some_and(|n| self.served >= n) {
            return Err(SearchError::Unavailable("cursor lost".to_string()));
        }
        let take = self.page_size.min(self.remaining.len());
        let page: Vec<Hit> = self.remaining.drain(..take).collect();
        self.served += 1;
        self.counters.pages_served.fetch_add(1, AtomicOrdering::SeqCst);
        Ok(page)
    }

    async fn close(self: Box<Self>) -> Result<(), SearchError> {
        Ok(())
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.counters.open_cursors.fetch_sub(1, AtomicOrdering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Field resolution context; inside a `nested` query fields under its path
/// resolve against the one nested object being tested.
#[derive(Clone, Copy)]
struct Scope<'a> {
    root: &'a Map<String, Value>,
    nested: Option<(&'a str, &'a Map<String, Value>)>,
}

impl<'a> Scope<'a> {
    fn root(root: &'a Map<String, Value>) -> Self {
        Self { root, nested: None }
    }

    fn values(&self, field: &str) -> Vec<&'a Value> {
        let mut out = Vec::new();
        if let Some((path, object)) = self.nested {
            if let Some(rest) = field.strip_prefix(path).and_then(|r| r.strip_prefix('.')) {
                resolve(object, rest, &mut out);
                return out;
            }
        }
        resolve(self.root, field, &mut out);
        out
    }

    /// The unflattened value at `field`; points are arrays.
    fn point(&self, field: &str) -> Option<&'a Value> {
        let mut map = self.root;
        let mut path = field;
        if let Some((nested, object)) = self.nested {
            if let Some(rest) = field.strip_prefix(nested).and_then(|r| r.strip_prefix('.')) {
                map = object;
                path = rest;
            }
        }
        loop {
            if let Some(v) = map.get(path) {
                return Some(v);
            }
            let (head, rest) = path.split_once('.')?;
            map = map.get(head)?.as_object()?;
            path = rest;
        }
    }
}

/// Collect the scalar values at a dotted path, walking through arrays.
fn resolve<'a>(source: &'a Map<String, Value>, path: &str, out: &mut Vec<&'a Value>) {
    if let Some(v) = source.get(path) {
        flatten(v, out);
        return;
    }
    let Some((head, rest)) = path.split_once('.') else {
        return;
    };
    match source.get(head) {
        Some(Value::Object(inner)) => resolve(inner, rest, out),
        Some(Value::Array(items)) => {
            for item in items {
                if let Value::Object(inner) = item {
                    resolve(inner, rest, out);
                }
            }
        }
        _ => {}
    }
}

fn flatten<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|v| flatten(v, out)),
        Value::Null => {}
        other => out.push(other),
    }
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn matches(query: &Query, scope: &Scope<'_>) -> bool {
    match query {
        Query::MatchAll => true,
        Query::Match { field, value } => {
            let Some(wanted) = text_of(value) else {
                return false;
            };
            match field.strip_suffix(RAW_SUFFIX) {
                Some(base) => scope
                    .values(base)
                    .into_iter()
                    .any(|v| text_of(v).as_deref() == Some(wanted.as_str())),
                None => {
                    let wanted = wanted.to_lowercase();
                    scope
                        .values(field)
                        .into_iter()
                        .any(|v| text_of(v).is_some_and(|t| t.to_lowercase() == wanted))
                }
            }
        }
        Query::MultiMatch { query, fields } => {
            let candidates: Vec<&Value> = if fields.is_empty() {
                scope.root.values().collect()
            } else {
                fields.iter().flat_map(|f| scope.values(f)).collect()
            };
            candidates
                .into_iter()
                .filter_map(text_of)
                .any(|text| phrase_prefix(&text, query))
        }
        Query::Bool { must, filter } => must.iter().chain(filter.iter()).all(|q| matches(q, scope)),
        Query::Nested { path, query } => {
            let mut objects = Vec::new();
            resolve(scope.root, path, &mut objects);
            objects.into_iter().any(|object| match object {
                Value::Object(map) => matches(
                    query,
                    &Scope {
                        root: scope.root,
                        nested: Some((path.as_str(), map)),
                    },
                ),
                _ => false,
            })
        }
        Query::Geo { field, points, .. } => {
            let Some(polygon) = points.iter().map(point).collect::<Option<Vec<_>>>() else {
                return false;
            };
            scope
                .point(field)
                .and_then(point)
                .is_some_and(|p| inside(p, &polygon))
        }
    }
}

/// A geo point as `(lon, lat)`: `[lon, lat]`, `{"lat", "lon"}` or `"lat,lon"`.
fn point(value: &Value) -> Option<(f64, f64)> {
    match value {
        Value::Array(xy) if xy.len() == 2 => Some((xy[0].as_f64()?, xy[1].as_f64()?)),
        Value::Object(map) => Some((map.get("lon")?.as_f64()?, map.get("lat")?.as_f64()?)),
        Value::String(s) => {
            let (lat, lon) = s.split_once(',')?;
            Some((lon.trim().parse().ok()?, lat.trim().parse().ok()?))
        }
        _ => None,
    }
}

/// The ring closes implicitly; points on the boundary are outside.
fn inside(p: (f64, f64), ring: &[(f64, f64)]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    Polygon::new(LineString::from(ring.to_vec()), Vec::new()).contains(&Point::from(p))
}

/// `query` occurs in `text` starting at a word boundary, case-insensitively.
fn phrase_prefix(text: &str, query: &str) -> bool {
    let text = text.to_lowercase();
    let query = query.to_lowercase();
    text.match_indices(&query)
        .any(|(i, _)| !text[..i].chars().next_back().is_some_and(char::is_alphanumeric))
}

// ---------------------------------------------------------------------------
// Sorting and aggregations
// ---------------------------------------------------------------------------

fn sort_value<'a>(hit: &'a Hit, field: &str) -> Option<&'a Value> {
    let field = field.strip_suffix(RAW_SUFFIX).unwrap_or(field);
    Scope::root(&hit.source).values(field).into_iter().next()
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => text_of(a).cmp(&text_of(b)),
    }
}

/// Missing values sort last in either direction.
fn compare_hits(a: &Hit, b: &Hit, sort: &[SortField]) -> Ordering {
    for key in sort {
        let ord = match (sort_value(a, &key.field), sort_value(b, &key.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => match key.order {
                SortOrder::Asc => compare_values(x, y),
                SortOrder::Desc => compare_values(y, x),
            },
        };
        if ord.is_ne() {
            return ord;
        }
    }
    Ordering::Equal
}

fn distinct_keys(hit: &Hit, field: &str) -> BTreeSet<String> {
    let field = field.strip_suffix(RAW_SUFFIX).unwrap_or(field);
    Scope::root(&hit.source)
        .values(field)
        .into_iter()
        .filter_map(text_of)
        .collect()
}

fn aggregate(aggs: &BTreeMap<String, Aggregation>, matched: &[&Hit]) -> Value {
    let mut out = Map::new();
    for (name, agg) in aggs {
        let body = match agg {
            Aggregation::Terms { field, size } => {
                let mut counts: BTreeMap<String, u64> = BTreeMap::new();
                for hit in matched {
                    for key in distinct_keys(hit, field) {
                        *counts.entry(key).or_default() += 1;
                    }
                }
                let total: u64 = counts.values().sum();
                let buckets: Vec<Value> = counts
                    .iter()
                    .take(*size as usize)
                    .map(|(key, n)| json!({ "key": key, "doc_count": n }))
                    .collect();
                let shown: u64 = counts.values().take(*size as usize).sum();
                json!({
                    "doc_count_error_upper_bound": 0,
                    "sum_other_doc_count": total - shown,
                    "buckets": buckets,
                })
            }
            Aggregation::Cardinality { field, .. } => {
                let distinct: BTreeSet<String> = matched.iter().flat_map(|h| distinct_keys(h, field)).collect();
                json!({ "value": distinct.len() })
            }
        };
        out.insert(name.clone(), body);
    }
    Value::Object(out)
}
