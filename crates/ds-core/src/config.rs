//! Configuration types for dataselectie.
//!
//! [`Config::load`] layers an optional TOML file and `DATASELECTIE__*`
//! environment variables on top of the embedded defaults. [`Config::defaults`]
//! returns the embedded defaults alone (useful in tests).
//!
//! Search surfaces are configuration, not code: each `[[surface]]` entry
//! declares the index, record model, filter keywords, facets, sorts and export
//! columns of one dataset. A file that declares `[[surface]]` replaces the
//! built-in list.

use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[search]
preview_size          = 100
max_search_window     = 10000
aggs_value_size       = 100
cardinality_precision = 1000

[export]
batch_size = 100
delimiter  = ";"

[geo]
bbox_zoom_threshold      = 12
min_zoom                 = 8
max_zoom                 = 12
grouped_owner_default    = "9"
grouped_category_default = "99"
attribute_filters        = ["eigenaar", "categorie"]

[elastic]
url          = "http://127.0.0.1:9200"
timeout_secs = 30
scroll_keepalive = "2m"

[server]
bind = "127.0.0.1:8000"

# -------------------------------------------------------------------------
# BAG: addresses
# -------------------------------------------------------------------------
[[surface]]
name  = "bag"
index = "ds_index"
model = "nummeraanduiding"
keywords = [
    "postcode", "naam", "woonplaats",
    "buurt_naam", "buurt_code", "buurtcombinatie_naam", "buurtcombinatie_code",
    "ggw_naam", "ggw_code", "stadsdeel_naam", "stadsdeel_code",
]
raw_fields    = ["naam", "_openbare_ruimte_naam"]
text_fields   = ["_openbare_ruimte_naam", "postcode", "woonplaats"]
fixed_filters = [{ field = "dataset", value = "bag" }]
sort          = ["_openbare_ruimte_naam", "huisnummer", "huisletter", "huisnummer_toevoeging"]
record_sort   = ["_openbare_ruimte_naam", "huisnummer", "huisletter", "huisnummer_toevoeging"]
source_exclude = ["centroid"]
geo_fields    = [{ name = "shape", field = "centroid" }]
facets = [
    { name = "postcode",             field = "postcode" },
    { name = "openbare_ruimte",      field = "naam" },
    { name = "buurtcombinatie_naam", field = "buurtcombinatie_naam" },
    { name = "buurtcombinatie_code", field = "buurtcombinatie_code" },
    { name = "buurt_naam",           field = "buurt_naam" },
    { name = "buurt_code",           field = "buurt_code" },
    { name = "ggw_naam",             field = "ggw_naam" },
    { name = "ggw_code",             field = "ggw_code" },
    { name = "stadsdeel_naam",       field = "stadsdeel_naam" },
    { name = "stadsdeel_code",       field = "stadsdeel_code" },
]
export = [
    { field = "_openbare_ruimte_naam",  header = "Naam openbare ruimte" },
    { field = "huisnummer",             header = "Huisnummer" },
    { field = "huisletter",             header = "Huisletter" },
    { field = "huisnummer_toevoeging",  header = "Huisnummertoevoeging" },
    { field = "postcode",               header = "Postcode" },
    { field = "woonplaats",             header = "Woonplaats" },
    { field = "stadsdeel_naam",         header = "Naam stadsdeel" },
    { field = "stadsdeel_code",         header = "Code stadsdeel" },
    { field = "buurtcombinatie_naam",   header = "Naam buurtcombinatie" },
    { field = "buurtcombinatie_code",   header = "Code buurtcombinatie" },
    { field = "buurt_naam",             header = "Naam buurt" },
    { field = "buurt_code",             header = "Code buurt" },
    { field = "begin_geldigheid",       header = "Begin geldigheid" },
]

# -------------------------------------------------------------------------
# HR: commercial registrations
# -------------------------------------------------------------------------
[[surface]]
name  = "hr"
index = "ds_index"
model = "vestiging"
keywords = [
    "hoofdcategorie", "subcategorie", "sbi_code", "sbi_omschrijving",
    "handelsnaam", "bijzondere_rechtstoestand",
    "postcode", "buurt_naam", "ggw_naam", "stadsdeel_naam", "stadsdeel_code",
]
raw_fields    = ["handelsnaam"]
text_fields   = ["handelsnaam", "bezoekadres_volledig_adres"]
fixed_filters = [{ field = "dataset", value = "hr" }]
sort          = ["handelsnaam"]
record_sort   = ["handelsnaam", "id"]
listing_source_fields = ["hoofdcategorie", "subcategorie"]
source_exclude = ["centroid", "sbi_codes"]
geo_fields    = [{ name = "shape", field = "centroid" }]
keyword_mapping = { hoofdcategorie = "sbi_codes.hoofdcategorie", subcategorie = "sbi_codes.subcategorie", sbi_code = "sbi_codes.sbi_code", sbi_omschrijving = "sbi_codes.sbi_omschrijving" }
facets = [
    { name = "hoofdcategorie",            field = "hoofdcategorie" },
    { name = "subcategorie",              field = "subcategorie" },
    { name = "bijzondere_rechtstoestand", field = "bijzondere_rechtstoestand" },
    { name = "buurt_naam",                field = "buurt_naam" },
    { name = "stadsdeel_naam",            field = "stadsdeel_naam" },
]
export = [
    { field = "kvk_nummer",                 header = "KvK-nummer" },
    { field = "handelsnaam",                header = "Handelsnaam" },
    { field = "bezoekadres_volledig_adres", header = "Bezoekadres" },
    { field = "postcode",                   header = "Postcode" },
    { field = "stadsdeel_naam",             header = "Naam stadsdeel" },
    { field = "hoofdcategorie",             header = "Hoofdcategorie" },
    { field = "subcategorie",               header = "Subcategorie" },
    { field = "datum_aanvang",              header = "Datum aanvang" },
    { field = "non_mailing",                header = "Non-mailing" },
]

# -------------------------------------------------------------------------
# BRK: cadastral objects
# -------------------------------------------------------------------------
[[surface]]
name  = "brk"
index = "ds_brk"
model = "kadastraal_object"
keywords = [
    "eigenaar_categorie_id", "eigenaar_cat", "grondeigenaar", "aanschrijfbaar",
    "appartementeigenaar", "buurt_naam", "buurt_code", "wijk_code", "wijk_naam",
    "ggw_naam", "ggw_code", "stadsdeel_naam", "stadsdeel_code",
]
text_fields   = ["aanduiding"]
sort          = ["aanduiding"]
record_sort   = ["aanduiding"]
facets = [
    { name = "eigenaar_cat",   field = "eigenaar_cat" },
    { name = "buurt_naam",     field = "buurt_naam" },
    { name = "wijk_naam",      field = "wijk_naam" },
    { name = "ggw_naam",       field = "ggw_naam" },
    { name = "stadsdeel_naam", field = "stadsdeel_naam" },
]
export = [
    { field = "aanduiding",              header = "Kadastrale aanduiding" },
    { field = "kadastrale_gemeentecode", header = "Kadastrale gemeentecode" },
    { field = "sectie",                  header = "Sectie" },
    { field = "perceelnummer",           header = "Perceelnummer" },
    { field = "stadsdeel_naam",          header = "Naam stadsdeel" },
    { field = "buurt_naam",              header = "Naam buurt" },
    { field = "koopsom",                 header = "Koopsom" },
    { field = "koopjaar",                header = "Koopjaar" },
    { field = "grootte",                 header = "Grootte" },
]
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub elastic: ElasticConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default, rename = "surface")]
    pub surfaces: Vec<SurfaceConfig>,
}

/// `[search]` section: paging window and facet sizing.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_preview_size")]
    pub preview_size: u64,
    /// Largest `from + size` the backend is ever asked for.
    #[serde(default = "default_max_search_window")]
    pub max_search_window: u64,
    #[serde(default = "default_aggs_value_size")]
    pub aggs_value_size: u64,
    #[serde(default = "default_cardinality_precision")]
    pub cardinality_precision: u64,
}

fn default_preview_size() -> u64 { 100 }
fn default_max_search_window() -> u64 { 10_000 }
fn default_aggs_value_size() -> u64 { 100 }
fn default_cardinality_precision() -> u64 { 1_000 }

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            preview_size: default_preview_size(),
            max_search_window: default_max_search_window(),
            aggs_value_size: default_aggs_value_size(),
            cardinality_precision: default_cardinality_precision(),
        }
    }
}

/// `[export]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

fn default_batch_size() -> usize { 100 }
fn default_delimiter() -> char { ';' }

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delimiter: default_delimiter(),
        }
    }
}

/// `[geo]` section: zoom thresholds of the geolocation summary.
#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    /// Zoom levels above this need an area scope or a bounding box.
    #[serde(default = "default_bbox_zoom_threshold")]
    pub bbox_zoom_threshold: i64,
    #[serde(default = "default_min_zoom")]
    pub min_zoom: i64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: i64,
    #[serde(default = "default_grouped_owner")]
    pub grouped_owner_default: String,
    #[serde(default = "default_grouped_category")]
    pub grouped_category_default: String,
    /// Request parameters passed through to the geometry store as filters.
    #[serde(default = "default_attribute_filters")]
    pub attribute_filters: Vec<String>,
}

fn default_bbox_zoom_threshold() -> i64 { 12 }
fn default_min_zoom() -> i64 { 8 }
fn default_max_zoom() -> i64 { 12 }
fn default_grouped_owner() -> String { "9".to_string() }
fn default_grouped_category() -> String { "99".to_string() }
fn default_attribute_filters() -> Vec<String> { vec!["eigenaar".to_string(), "categorie".to_string()] }

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            bbox_zoom_threshold: default_bbox_zoom_threshold(),
            min_zoom: default_min_zoom(),
            max_zoom: default_max_zoom(),
            grouped_owner_default: default_grouped_owner(),
            grouped_category_default: default_grouped_category(),
            attribute_filters: default_attribute_filters(),
        }
    }
}

/// `[elastic]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ElasticConfig {
    /// Cluster base URL. Plain `http://` only; other schemes are rejected
    /// when the backend is built.
    #[serde(default = "default_elastic_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_scroll_keepalive")]
    pub scroll_keepalive: String,
}

fn default_elastic_url() -> String { "http://127.0.0.1:9200".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_scroll_keepalive() -> String { "2m".to_string() }

impl Default for ElasticConfig {
    fn default() -> Self {
        Self {
            url: default_elastic_url(),
            timeout_secs: default_timeout_secs(),
            scroll_keepalive: default_scroll_keepalive(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_bind() -> String { "127.0.0.1:8000".to_string() }

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

/// One `[[surface]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SurfaceConfig {
    pub name: String,
    pub index: String,
    pub model: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub raw_fields: Vec<String>,
    /// Parameter name → backend field; a dotted target lives in a nested document.
    #[serde(default)]
    pub keyword_mapping: BTreeMap<String, String>,
    #[serde(default)]
    pub fixed_filters: Vec<FixedFilterConfig>,
    #[serde(default)]
    pub text_fields: Vec<String>,
    #[serde(default)]
    pub facets: Vec<FacetConfig>,
    /// Parameters carrying a polygon as a JSON list of points.
    #[serde(default)]
    pub geo_fields: Vec<GeoFieldConfig>,
    /// Backend sort; a leading `-` sorts descending.
    #[serde(default)]
    pub sort: Vec<String>,
    /// Secondary sort applied when loading records by identifier.
    #[serde(default)]
    pub record_sort: Vec<String>,
    #[serde(default)]
    pub listing_source_fields: Vec<String>,
    #[serde(default)]
    pub source_exclude: Vec<String>,
    #[serde(default)]
    pub export: Vec<ExportColumnConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixedFilterConfig {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacetConfig {
    pub name: String,
    pub field: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoFieldConfig {
    pub name: String,
    pub field: String,
    #[serde(default = "default_geo_kind")]
    pub kind: String,
}

fn default_geo_kind() -> String { "geo_polygon".to_string() }

#[derive(Debug, Clone, Deserialize)]
pub struct ExportColumnConfig {
    pub field: String,
    pub header: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load the embedded defaults, then `path` (when given) and finally
    /// `DATASELECTIE__SECTION__KEY` environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        builder
            .add_source(config::Environment::with_prefix("DATASELECTIE").separator("__"))
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }

    pub fn surface(&self, name: &str) -> Option<&SurfaceConfig> {
        self.surfaces.iter().find(|s| s.name == name)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
