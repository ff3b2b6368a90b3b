//! Error types for the query pipeline.
//!
//! Each collaborator has its own error enum; [`Error`] wraps them so the HTTP
//! layer can decide between a client error and a server-side failure with
//! [`Error::is_client_error`]. An empty result set is never an error.

use thiserror::Error;

/// Top-level pipeline error.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Geo(#[from] GeoError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("unknown search surface: {0}")]
    UnknownSurface(String),

    #[error("export encoding failed: {0}")]
    Encode(String),
}

impl Error {
    /// True for errors caused by the request itself (4xx-equivalent).
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Geo(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::UnknownSurface(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Search backend
// ---------------------------------------------------------------------------

/// Failures talking to the search backend. Distinct from zero matches.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search backend unavailable: {0}")]
    Unavailable(String),

    #[error("search backend timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("search backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode search backend response: {0}")]
    Decode(String),
}

impl From<serde_json::Error> for SearchError {
    fn from(e: serde_json::Error) -> Self {
        SearchError::Decode(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Record and geometry stores
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record store unavailable: {0}")]
    Unavailable(String),

    #[error("unknown record model: {0}")]
    UnknownModel(String),

    #[error("unknown geometry layer: {0}")]
    UnknownLayer(String),
}

// ---------------------------------------------------------------------------
// Geo requests
// ---------------------------------------------------------------------------

/// Client input errors of the geolocation endpoint.
#[derive(Debug, Error, PartialEq)]
pub enum GeoError {
    #[error(
        "bounding box required at zoom level {zoom}: pass bbox=minx,miny,maxx,maxy \
         or narrow the request to a buurt, wijk, ggw or stadsdeel"
    )]
    BoundingBoxRequired { zoom: i64 },

    #[error("invalid bounding box {0:?}: expected four comma separated numbers minx,miny,maxx,maxy")]
    InvalidBoundingBox(String),
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("surface {surface:?}: {message}")]
    Surface { surface: String, message: String },

    #[error("elastic.url {url:?}: {message}")]
    ElasticUrl { url: String, message: String },
}
