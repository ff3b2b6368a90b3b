//! JSON fixture loader for the in-memory collaborators.
//!
//! ```json
//! {
//!   "documents": { "ds_index": [ { "_id": "1", "_source": { "dataset": "bag" } } ] },
//!   "records":   { "nummeraanduiding": [ { "id": "1", "huisnummer": 12 } ] },
//!   "geo":       { "eigenpercelen": [ { "geometry": { "type": "Point", "coordinates": [4.9, 52.3] },
//!                                       "properties": { "buurt": "A00a" } } ] }
//! }
//! ```

use crate::geo::{GeoFeature, MemoryGeoStore};
use crate::memory::MemoryIndex;
use crate::records::MemoryRecordStore;
use anyhow::{anyhow, bail, Context};
use ds_core::geo::GeoLayer;
use ds_core::types::{FieldValue, Hit, Record};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct FixtureFile {
    #[serde(default)]
    documents: BTreeMap<String, Vec<DocumentFixture>>,
    #[serde(default)]
    records: BTreeMap<String, Vec<Map<String, Value>>>,
    #[serde(default)]
    geo: BTreeMap<String, Vec<GeoFixture>>,
}

#[derive(Debug, Deserialize)]
struct DocumentFixture {
    #[serde(rename = "_id")]
    id: Value,
    #[serde(rename = "_source", default)]
    source: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct GeoFixture {
    geometry: Value,
    #[serde(default)]
    properties: BTreeMap<String, Value>,
    #[serde(default)]
    point: Option<[f64; 2]>,
}

/// The three in-memory collaborators, filled from one fixture file.
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    pub index: MemoryIndex,
    pub records: MemoryRecordStore,
    pub geo: MemoryGeoStore,
}

fn id_text(value: &Value) -> anyhow::Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => bail!("identifier must be a string or number, got {other}"),
    }
}

fn property_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl Fixtures {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading fixtures {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("parsing fixtures {}", path.display()))
    }

    pub fn from_json_str(raw: &str) -> anyhow::Result<Self> {
        let file: FixtureFile = serde_json::from_str(raw)?;
        let mut out = Fixtures::default();
        let (mut documents, mut records, mut features) = (0usize, 0usize, 0usize);

        for (index, docs) in file.documents {
            for doc in docs {
                let hit = Hit {
                    id: id_text(&doc.id)?,
                    source: doc.source,
                };
                out.index.insert(index.clone(), hit);
                documents += 1;
            }
        }

        for (model, rows) in file.records {
            for mut row in rows {
                let id = row
                    .remove("id")
                    .ok_or_else(|| anyhow!("record of model {model:?} has no id"))?;
                let mut record = Record::new(id_text(&id)?);
                for (k, v) in row {
                    record.fields.insert(k, FieldValue::from_json_guess(&v));
                }
                out.records.insert(model.clone(), record);
                records += 1;
            }
        }

        for (layer_name, items) in file.geo {
            let layer = GeoLayer::from_name(&layer_name).ok_or_else(|| anyhow!("unknown geo layer {layer_name:?}"))?;
            for fixture in items {
                let mut feature = GeoFeature::new(fixture.geometry);
                if let Some([x, y]) = fixture.point {
                    feature.point = Some((x, y));
                }
                for (k, v) in &fixture.properties {
                    feature.properties.insert(k.clone(), property_text(v));
                }
                out.geo.insert(layer, feature);
                features += 1;
            }
        }

        tracing::info!(documents, records, features, "fixtures loaded");
        Ok(out)
    }
}
