//! dataselectie: faceted search, hydration and CSV export over a
//! civic-registry document index.
//!
//! This crate wires the workspace together for the binary and the
//! integration harnesses.
//!
//! # Architecture
//!
//! ```text
//! HTTP / CLI ──► ds-api ──► ds-core pipeline ──► SearchBackend (Elasticsearch | memory)
//!                               │
//!                               ├──► RecordStore (system of record)
//!                               └──► GeoStore
//! ```

pub use ds_api as api;
pub use ds_backends as backends;
pub use ds_core as pipeline;

use anyhow::Context;
use ds_api::AppState;
use ds_backends::{ElasticBackend, Fixtures};
use ds_core::backend::SearchBackend;
use ds_core::config::Config;
use ds_core::types::Params;
use std::path::PathBuf;
use std::sync::Arc;

/// Where the collaborators come from.
#[derive(Debug, Clone)]
pub struct DataSource {
    /// JSON fixtures providing the record and geometry stores, and the
    /// search index unless `elastic` is set.
    pub fixtures: PathBuf,
    /// Search the configured Elasticsearch cluster instead of the fixture index.
    pub elastic: bool,
}

pub fn build_state(config: Config, source: &DataSource) -> anyhow::Result<AppState> {
    let fixtures = Fixtures::load(&source.fixtures)?;
    let backend: Arc<dyn SearchBackend> = if source.elastic {
        tracing::info!(url = %config.elastic.url, "using Elasticsearch");
        Arc::new(ElasticBackend::new(&config.elastic)?)
    } else {
        Arc::new(fixtures.index)
    };
    AppState::new(config, backend, Arc::new(fixtures.records), Arc::new(fixtures.geo))
        .context("building application state")
}

/// Parse `key=value` command-line arguments into request parameters.
pub fn parse_params<S: AsRef<str>>(args: &[S]) -> anyhow::Result<Params> {
    let mut params = Params::new();
    for arg in args {
        let arg = arg.as_ref();
        let (k, v) = arg
            .split_once('=')
            .with_context(|| format!("expected key=value, got {arg:?}"))?;
        params.insert(k, v);
    }
    Ok(params)
}
