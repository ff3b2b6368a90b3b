//! ds-core: the dataselectie query pipeline.
//!
//! Turns request parameters into one search-backend query document, runs it,
//! and hydrates the matches from the system-of-record store, either as a
//! bounded listing or as an unbounded streaming export.
//!
//! # Architecture
//!
//! ```text
//! Params ──► query::filter ──► query::assemble ──► query::window
//!                                   │    ▲
//!                                   │    └── query::aggs
//!                                   ▼
//!                           SearchBackend ──► hydrate (listing)
//!                                   │
//!                                   └──► ExportCursor ──► export (CSV)
//!
//! Params ──► geo (zoom switch) ──► GeoStore
//! ```
//!
//! Every dataset is a [`SearchSurface`] built from configuration; there is no
//! per-dataset code. Collaborators sit behind the traits in [`backend`] and
//! [`geo::GeoStore`]; concrete implementations live in `ds-backends`.

pub mod backend;
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod geo;
pub mod hydrate;
pub mod query;
pub mod surface;
pub mod types;

pub use backend::{ExportCursor, RecordStore, SearchBackend};
pub use config::Config;
pub use error::{Error, Result};
pub use export::{ExportEngine, ExportRow};
pub use geo::{GeoStore, GeoSummary, GeoSwitch};
pub use hydrate::{Hydrator, ListingResponse};
pub use surface::{SearchSurface, Surfaces};
pub use types::{FieldValue, Hit, Params, Record, SearchResults};
