//! Result hydrator: bounded listings.
//!
//! One search, then one record-store read for the matched identifiers. The
//! records are authoritative; selected search-backend fields are merged on
//! top and every value is turned into its display string.
//!
//! [`Hydrator::locate`] answers map requests from the index alone: every
//! match in the search window with its centroid, and no record-store read.

use crate::backend::{RecordStore, SearchBackend};
use crate::config::SearchConfig;
use crate::display::{display_json, display_string};
use crate::error::Result;
use crate::query::{aggs, compile_geolocation, compile_listing, CENTROID_FIELD};
use crate::surface::SearchSurface;
use crate::types::{Hit, Params, Record};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// A hydrated row: field name → display string.
pub type Row = BTreeMap<String, String>;

/// JSON body of a listing response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingResponse {
    pub object_list: Vec<Row>,
    pub object_count: u64,
    pub page_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggs_list: Option<Value>,
}

/// One located document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub id: String,
    /// Centroid as stored in the index; `null` when the document has none.
    pub centroid: Value,
}

/// JSON body of a geolocation response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationResponse {
    pub object_count: u64,
    pub object_list: Vec<Location>,
}

/// Which search-backend source fields to merge onto a record row.
#[derive(Debug, Clone, Copy)]
pub enum SourceFields<'a> {
    All,
    Only(&'a [String]),
}

/// Stringify a record and merge source fields from its hit over it.
/// Search-backend values win on key collisions.
pub fn merge_row(record: &Record, hit: Option<&Hit>, source: SourceFields<'_>) -> Row {
    let mut row: Row = record
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), display_string(v)))
        .collect();
    row.entry("id".to_string()).or_insert_with(|| record.id.clone());

    if let Some(hit) = hit {
        match source {
            SourceFields::All => {
                for (k, v) in &hit.source {
                    row.insert(k.clone(), display_json(v));
                }
            }
            SourceFields::Only(keys) => {
                for k in keys {
                    if let Some(v) = hit.source.get(k) {
                        row.insert(k.clone(), display_json(v));
                    }
                }
            }
        }
    }
    row
}

/// `ceil(total / preview_size)`.
pub fn page_count(total: u64, preview_size: u64) -> u64 {
    if preview_size == 0 {
        return 0;
    }
    total.div_ceil(preview_size)
}

pub struct Hydrator<'a> {
    backend: &'a dyn SearchBackend,
    store: &'a dyn RecordStore,
    search: &'a SearchConfig,
}

impl<'a> Hydrator<'a> {
    pub fn new(backend: &'a dyn SearchBackend, store: &'a dyn RecordStore, search: &'a SearchConfig) -> Self {
        Self { backend, store, search }
    }

    /// Run a listing request end to end.
    pub async fn list(&self, surface: &SearchSurface, params: &Params) -> Result<ListingResponse> {
        let compiled = compile_listing(surface, params, self.search);
        let results = self
            .backend
            .search(&surface.index, &compiled.document)
            .await
            .inspect_err(|e| tracing::error!(surface = %surface.name, error = %e, "search failed"))?;

        let aggs_list = compiled
            .document
            .aggs
            .as_ref()
            .map(|_| aggs::render(&surface.facets, results.aggregations.as_ref(), &compiled.echoed));
        let object_count = results.total;
        let page_count = page_count(object_count, self.search.preview_size);

        let ids = results.ids();
        if ids.is_empty() {
            tracing::debug!(surface = %surface.name, total = object_count, "no identifiers in window");
            return Ok(ListingResponse {
                object_list: Vec::new(),
                object_count,
                page_count,
                aggs_list,
            });
        }

        let records = self
            .store
            .find_by_ids(&surface.model, &ids, &surface.record_sort)
            .await?;
        let hits: HashMap<&str, &Hit> = results.hits.iter().map(|h| (h.id.as_str(), h)).collect();
        let object_list: Vec<Row> = records
            .iter()
            .take(self.search.preview_size as usize)
            .map(|r| {
                merge_row(
                    r,
                    hits.get(r.id.as_str()).copied(),
                    SourceFields::Only(&surface.listing_source_fields),
                )
            })
            .collect();

        tracing::debug!(
            surface = %surface.name,
            total = object_count,
            ids = ids.len(),
            rows = object_list.len(),
            "hydrated listing"
        );
        Ok(ListingResponse {
            object_list,
            object_count,
            page_count,
            aggs_list,
        })
    }

    /// Centroids of every match within the search window.
    pub async fn locate(&self, surface: &SearchSurface, params: &Params) -> Result<LocationResponse> {
        let compiled = compile_geolocation(surface, params, self.search);
        let results = self
            .backend
            .search(&surface.index, &compiled.document)
            .await
            .inspect_err(|e| tracing::error!(surface = %surface.name, error = %e, "geolocation search failed"))?;

        let object_list: Vec<Location> = results
            .hits
            .into_iter()
            .map(|mut hit| Location {
                centroid: hit.source.remove(CENTROID_FIELD).unwrap_or(Value::Null),
                id: hit.id,
            })
            .collect();
        tracing::debug!(
            surface = %surface.name,
            total = results.total,
            located = object_list.len(),
            "located documents"
        );
        Ok(LocationResponse {
            object_count: results.total,
            object_list,
        })
    }
}
