//! In-memory geometry store.
//!
//! Features carry flat string properties (`buurt`, `wijk`, `ggw`,
//! `stadsdeel`, `eigenaar`, `categorie`, `zoom`) and a representative point
//! used for bounding-box tests.

use async_trait::async_trait;
use ds_core::error::StoreError;
use ds_core::geo::{GeoFilter, GeoLayer, GeoStore};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub struct GeoFeature {
    pub geometry: Value,
    pub properties: BTreeMap<String, String>,
    /// Representative point; derived from `Point` geometries when absent.
    pub point: Option<(f64, f64)>,
}

impl GeoFeature {
    pub fn new(geometry: Value) -> Self {
        let point = point_of(&geometry);
        Self {
            geometry,
            properties: BTreeMap::new(),
            point,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    fn matches(&self, filter: &GeoFilter) -> bool {
        if let Some(area) = &filter.area {
            if self.properties.get(area.level.param()) != Some(&area.code) {
                return false;
            }
        }
        if let Some(bbox) = &filter.bbox {
            match self.point {
                Some((x, y)) if bbox.contains(x, y) => {}
                _ => return false,
            }
        }
        if let Some(zoom) = filter.zoom {
            if let Some(own) = self.properties.get("zoom") {
                if own.parse::<i64>().ok() != Some(zoom) {
                    return false;
                }
            }
        }
        filter
            .attributes
            .iter()
            .all(|(k, v)| self.properties.get(k) == Some(v))
    }

    fn as_feature(&self) -> Value {
        json!({
            "type": "Feature",
            "geometry": self.geometry,
            "properties": self.properties,
        })
    }
}

fn point_of(geometry: &Value) -> Option<(f64, f64)> {
    if geometry.get("type").and_then(Value::as_str) != Some("Point") {
        return None;
    }
    let coords = geometry.get("coordinates")?.as_array()?;
    Some((coords.first()?.as_f64()?, coords.get(1)?.as_f64()?))
}

#[derive(Debug, Default, Clone)]
pub struct MemoryGeoStore {
    layers: BTreeMap<GeoLayer, Vec<GeoFeature>>,
    calls: Arc<AtomicUsize>,
}

impl MemoryGeoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, layer: GeoLayer, feature: GeoFeature) {
        self.layers.entry(layer).or_default().push(feature);
    }

    pub fn with_feature(mut self, layer: GeoLayer, feature: GeoFeature) -> Self {
        self.insert(layer, feature);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GeoStore for MemoryGeoStore {
    async fn features(&self, layer: GeoLayer, filter: &GeoFilter) -> Result<Vec<Value>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let Some(features) = self.layers.get(&layer) else {
            return Ok(Vec::new());
        };
        Ok(features
            .iter()
            .filter(|f| f.matches(filter))
            .map(|f| match layer {
                GeoLayer::Apartments => f.as_feature(),
                _ => f.geometry.clone(),
            })
            .collect())
    }
}
