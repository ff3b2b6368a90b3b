//! Geo zoom switch.
//!
//! Decides between detail-level geometry (individual apartments and parcels)
//! and pre-aggregated parcel groups, based on `zoom`, an optional area scope
//! and an optional bounding box. Planning is pure and happens before any
//! geometry store call, so a rejected request never reaches the store.

use crate::config::GeoConfig;
use crate::error::{GeoError, Result, StoreError};
use crate::types::Params;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Area scope and bounding box
// ---------------------------------------------------------------------------

/// Area levels, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AreaLevel {
    Stadsdeel,
    Ggw,
    Wijk,
    Buurt,
}

impl AreaLevel {
    pub const ALL: [AreaLevel; 4] = [AreaLevel::Stadsdeel, AreaLevel::Ggw, AreaLevel::Wijk, AreaLevel::Buurt];

    pub fn param(self) -> &'static str {
        match self {
            AreaLevel::Stadsdeel => "stadsdeel",
            AreaLevel::Ggw => "ggw",
            AreaLevel::Wijk => "wijk",
            AreaLevel::Buurt => "buurt",
        }
    }
}

impl fmt::Display for AreaLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.param())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaScope {
    pub level: AreaLevel,
    pub code: String,
}

impl AreaScope {
    /// The most specific area parameter in `params`; coarser ones are dropped.
    pub fn most_specific(params: &Params) -> Option<Self> {
        AreaLevel::ALL.iter().rev().find_map(|&level| {
            params.get(level.param()).map(|code| AreaScope {
                level,
                code: code.to_string(),
            })
        })
    }
}

/// `minx,miny,maxx,maxy` in map coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn parse(raw: &str) -> Result<Self, GeoError> {
        let invalid = || GeoError::InvalidBoundingBox(raw.to_string());
        let parts = raw
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        let &[a, b, c, d] = parts.as_slice() else {
            return Err(invalid());
        };
        if !parts.iter().all(|v| v.is_finite()) {
            return Err(invalid());
        }
        Ok(Self {
            min_x: a.min(c),
            min_y: b.min(d),
            max_x: a.max(c),
            max_y: b.max(d),
        })
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailLevel {
    Detail,
    Grouped,
}

/// Filter handed to the geometry store for every layer of one request.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GeoFilter {
    pub area: Option<AreaScope>,
    pub bbox: Option<BoundingBox>,
    /// Effective zoom for grouped layers; `None` when an area scope is set.
    pub zoom: Option<i64>,
    /// Attribute filters such as owner and category, by name.
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoPlan {
    pub level: DetailLevel,
    pub filter: GeoFilter,
}

impl GeoPlan {
    pub fn layers(&self) -> [GeoLayer; 3] {
        match self.level {
            DetailLevel::Detail => [GeoLayer::Apartments, GeoLayer::OwnParcels, GeoLayer::NonOwnParcels],
            DetailLevel::Grouped => [
                GeoLayer::Apartments,
                GeoLayer::OwnParcelGroups,
                GeoLayer::NonOwnParcelGroups,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GeoLayer {
    Apartments,
    OwnParcels,
    NonOwnParcels,
    OwnParcelGroups,
    NonOwnParcelGroups,
}

impl GeoLayer {
    pub fn name(self) -> &'static str {
        match self {
            GeoLayer::Apartments => "appartementen",
            GeoLayer::OwnParcels => "eigenpercelen",
            GeoLayer::NonOwnParcels => "niet_eigenpercelen",
            GeoLayer::OwnParcelGroups => "eigenperceelgroepen",
            GeoLayer::NonOwnParcelGroups => "niet_eigenperceelgroepen",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            GeoLayer::Apartments,
            GeoLayer::OwnParcels,
            GeoLayer::NonOwnParcels,
            GeoLayer::OwnParcelGroups,
            GeoLayer::NonOwnParcelGroups,
        ]
        .into_iter()
        .find(|l| l.name() == name)
    }
}

/// Source of geometry features per layer.
#[async_trait]
pub trait GeoStore: Send + Sync {
    /// GeoJSON geometries (or feature objects, for apartments) of `layer`
    /// matching `filter`.
    async fn features(&self, layer: GeoLayer, filter: &GeoFilter) -> Result<Vec<Value>, StoreError>;
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// The three named geometry buckets of a geo response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoSummary {
    #[serde(rename = "appartementen")]
    pub apartments: Vec<Value>,
    #[serde(rename = "eigenpercelen")]
    pub own_parcels: Value,
    #[serde(rename = "niet_eigenpercelen")]
    pub non_own_parcels: Value,
}

/// Union of geometries into one `GeometryCollection`; `null` when empty.
/// Nested collections are flattened.
pub fn collect(geometries: Vec<Value>) -> Value {
    let mut members = Vec::with_capacity(geometries.len());
    for geometry in geometries {
        flatten_into(geometry, &mut members);
    }
    if members.is_empty() {
        return Value::Null;
    }
    json!({ "type": "GeometryCollection", "geometries": members })
}

fn flatten_into(geometry: Value, out: &mut Vec<Value>) {
    match geometry {
        Value::Null => {}
        Value::Object(mut map) if map.get("type").and_then(Value::as_str) == Some("GeometryCollection") => {
            if let Some(Value::Array(inner)) = map.remove("geometries") {
                for g in inner {
                    flatten_into(g, out);
                }
            }
        }
        other => out.push(other),
    }
}

// ---------------------------------------------------------------------------
// Switch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct GeoSwitch {
    config: GeoConfig,
}

impl GeoSwitch {
    pub fn new(config: GeoConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, params: &Params) -> Result<GeoPlan, GeoError> {
        let area = AreaScope::most_specific(params);
        let zoom = params.get("zoom").and_then(|z| z.trim().parse::<i64>().ok());
        let mut attributes: BTreeMap<String, String> = self
            .config
            .attribute_filters
            .iter()
            .filter_map(|name| params.get(name).map(|v| (name.clone(), v.to_string())))
            .collect();

        if let Some(z) = zoom.filter(|z| *z > self.config.bbox_zoom_threshold) {
            if area.is_some() {
                let bbox = self.optional_bbox(params);
                return Ok(GeoPlan {
                    level: DetailLevel::Detail,
                    filter: GeoFilter { area, bbox, zoom: None, attributes },
                });
            }
            let Some(raw) = params.get("bbox") else {
                return Err(GeoError::BoundingBoxRequired { zoom: z });
            };
            let bbox = BoundingBox::parse(raw)
                .inspect_err(|e| tracing::warn!(bbox = raw, error = %e, "rejecting geo request"))?;
            return Ok(GeoPlan {
                level: DetailLevel::Detail,
                filter: GeoFilter {
                    area: None,
                    bbox: Some(bbox),
                    zoom: None,
                    attributes,
                },
            });
        }

        attributes
            .entry("eigenaar".to_string())
            .or_insert_with(|| self.config.grouped_owner_default.clone());
        attributes
            .entry("categorie".to_string())
            .or_insert_with(|| self.config.grouped_category_default.clone());
        let zoom = match area {
            Some(_) => None,
            None => Some(
                zoom.unwrap_or(self.config.min_zoom)
                    .clamp(self.config.min_zoom, self.config.max_zoom),
            ),
        };
        Ok(GeoPlan {
            level: DetailLevel::Grouped,
            filter: GeoFilter { area, bbox: None, zoom, attributes },
        })
    }

    /// A bbox next to an area scope only narrows; a malformed one is ignored.
    fn optional_bbox(&self, params: &Params) -> Option<BoundingBox> {
        let raw = params.get("bbox")?;
        BoundingBox::parse(raw)
            .inspect_err(|e| tracing::warn!(bbox = raw, error = %e, "ignoring malformed bbox"))
            .ok()
    }

    pub async fn run(&self, plan: &GeoPlan, store: &dyn GeoStore) -> Result<GeoSummary> {
        let [apartments_layer, own_layer, non_own_layer] = plan.layers();
        let apartments = match plan.level {
            DetailLevel::Detail => store.features(apartments_layer, &plan.filter).await?,
            DetailLevel::Grouped => Vec::new(),
        };
        let own = store.features(own_layer, &plan.filter).await?;
        let non_own = store.features(non_own_layer, &plan.filter).await?;

        tracing::debug!(
            level = ?plan.level,
            apartments = apartments.len(),
            own = own.len(),
            non_own = non_own.len(),
            "geo summary"
        );
        Ok(GeoSummary {
            apartments,
            own_parcels: collect(own),
            non_own_parcels: collect(non_own),
        })
    }

    pub async fn summarize(&self, params: &Params, store: &dyn GeoStore) -> Result<GeoSummary> {
        let plan = self.plan(params)?;
        self.run(&plan, store).await
    }
}
