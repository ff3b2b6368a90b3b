//! Aggregation planner and facet rendering.
//!
//! [`plan`] is a pure function from the facet list to the aggregation spec:
//! a `terms` aggregation per facet plus a `<facet>_count` cardinality so the
//! distinct-value count survives bucket truncation. [`render`] folds the
//! backend's answer back into the `aggs_list` response shape.

use super::filter::EchoedFilter;
use super::Aggregation;
use crate::config::SearchConfig;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Suffix of the companion cardinality aggregation.
pub const COUNT_SUFFIX: &str = "_count";

/// A facet: response name and the backend field it counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Facet {
    pub name: String,
    pub field: String,
}

pub fn plan(facets: &[Facet], search: &SearchConfig) -> BTreeMap<String, Aggregation> {
    let mut aggs = BTreeMap::new();
    for facet in facets {
        aggs.insert(
            facet.name.clone(),
            Aggregation::Terms {
                field: facet.field.clone(),
                size: search.aggs_value_size,
            },
        );
        aggs.insert(
            format!("{}{COUNT_SUFFIX}", facet.name),
            Aggregation::Cardinality {
                field: facet.field.clone(),
                precision_threshold: search.cardinality_precision,
            },
        );
    }
    aggs
}

/// Render backend aggregations as `{facet: {buckets, doc_count, selected?}}`.
///
/// `doc_count` is the cardinality estimate; `selected` echoes the filter
/// value the caller chose for that facet, if any.
pub fn render(facets: &[Facet], aggregations: Option<&Value>, echoed: &[EchoedFilter]) -> Value {
    let mut out = Map::new();
    for facet in facets {
        let buckets = aggregations
            .and_then(|a| a.get(&facet.name))
            .and_then(|a| a.get("buckets"))
            .and_then(Value::as_array)
            .map(|buckets| {
                buckets
                    .iter()
                    .map(|b| {
                        json!({
                            "key": b.get("key").cloned().unwrap_or(Value::Null),
                            "doc_count": b.get("doc_count").and_then(Value::as_u64).unwrap_or(0),
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let distinct = aggregations
            .and_then(|a| a.get(format!("{}{COUNT_SUFFIX}", facet.name)))
            .and_then(|a| a.get("value"))
            .and_then(Value::as_u64)
            .unwrap_or(buckets.len() as u64);

        let mut entry = Map::new();
        entry.insert("buckets".into(), Value::Array(buckets));
        entry.insert("doc_count".into(), json!(distinct));
        if let Some(chosen) = echoed.iter().find(|e| e.parameter == facet.name) {
            entry.insert("selected".into(), Value::String(chosen.value.clone()));
        }
        out.insert(facet.name.clone(), Value::Object(entry));
    }
    Value::Object(out)
}
