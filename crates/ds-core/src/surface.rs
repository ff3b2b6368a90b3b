//! Search surfaces: the per-dataset configuration value that parameterises
//! the whole pipeline.
//!
//! A [`SearchSurface`] is built once from its [`SurfaceConfig`] and is
//! immutable afterwards; request handling only reads it.

use crate::config::{Config, SurfaceConfig};
use crate::error::{ConfigError, Error};
use crate::query::aggs::Facet;
use crate::query::{FilterSpec, FixedFilter, GeoField, SortField};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// An export column: the row key it reads and the header label it shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportColumn {
    pub field: String,
    pub header: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchSurface {
    pub name: String,
    pub index: String,
    /// Record-store model the hits are hydrated from.
    pub model: String,
    pub filter_spec: FilterSpec,
    pub text_fields: Vec<String>,
    pub facets: Vec<Facet>,
    pub sort: Vec<SortField>,
    pub record_sort: Vec<SortField>,
    pub listing_source_fields: Vec<String>,
    pub source_exclude: Vec<String>,
    pub export_columns: Vec<ExportColumn>,
}

impl SearchSurface {
    pub fn from_config(cfg: &SurfaceConfig) -> Result<Self, ConfigError> {
        let invalid = |message: String| ConfigError::Surface {
            surface: cfg.name.clone(),
            message,
        };

        let mut seen = BTreeSet::new();
        for keyword in &cfg.keywords {
            if !seen.insert(keyword.as_str()) {
                return Err(invalid(format!("keyword {keyword:?} declared twice")));
            }
        }
        if let Some(orphan) = cfg.keyword_mapping.keys().find(|k| !seen.contains(k.as_str())) {
            return Err(invalid(format!("keyword_mapping entry {orphan:?} is not a keyword")));
        }
        if let Some(geo) = cfg.geo_fields.iter().find(|g| seen.contains(g.name.as_str())) {
            return Err(invalid(format!("geo field {:?} is also a keyword", geo.name)));
        }

        let raw_fields: BTreeSet<String> = cfg.raw_fields.iter().cloned().collect();
        let fixed = cfg
            .fixed_filters
            .iter()
            .map(|f| FixedFilter {
                field: f.field.clone(),
                value: Value::String(f.value.clone()),
            })
            .collect();
        let filter_spec = FilterSpec::new(
            cfg.keywords.iter().map(String::as_str),
            |p| cfg.keyword_mapping.get(p).map(String::as_str),
            &raw_fields,
            fixed,
        )
        .with_geo_fields(
            cfg.geo_fields
                .iter()
                .map(|g| GeoField {
                    parameter: g.name.clone(),
                    field: g.field.clone(),
                    kind: g.kind.clone(),
                })
                .collect(),
        );

        Ok(Self {
            name: cfg.name.clone(),
            index: cfg.index.clone(),
            model: cfg.model.clone(),
            filter_spec,
            text_fields: cfg.text_fields.clone(),
            facets: cfg
                .facets
                .iter()
                .map(|f| Facet {
                    name: f.name.clone(),
                    field: f.field.clone(),
                })
                .collect(),
            sort: cfg.sort.iter().map(|s| SortField::parse(s)).collect(),
            record_sort: cfg.record_sort.iter().map(|s| SortField::parse(s)).collect(),
            listing_source_fields: cfg.listing_source_fields.clone(),
            source_exclude: cfg.source_exclude.clone(),
            export_columns: cfg
                .export
                .iter()
                .map(|c| ExportColumn {
                    field: c.field.clone(),
                    header: c.header.clone(),
                })
                .collect(),
        })
    }

    /// Header labels in column order.
    pub fn export_headers(&self) -> Vec<String> {
        self.export_columns.iter().map(|c| c.header.clone()).collect()
    }
}

/// All configured surfaces by name.
#[derive(Debug, Clone, Default)]
pub struct Surfaces {
    by_name: BTreeMap<String, Arc<SearchSurface>>,
}

impl Surfaces {
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let mut by_name = BTreeMap::new();
        for cfg in &config.surfaces {
            let surface = SearchSurface::from_config(cfg)?;
            if by_name.insert(cfg.name.clone(), Arc::new(surface)).is_some() {
                return Err(ConfigError::Surface {
                    surface: cfg.name.clone(),
                    message: "declared twice".to_string(),
                });
            }
        }
        Ok(Self { by_name })
    }

    pub fn get(&self, name: &str) -> Result<Arc<SearchSurface>, Error> {
        self.by_name
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownSurface(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }
}
