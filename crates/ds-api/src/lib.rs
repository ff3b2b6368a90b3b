//! ds-api: HTTP surface for dataselectie.
//!
//! ```text
//! GET /                      configured surfaces
//! GET /{surface}/            listing JSON (object_list, object_count, page_count, aggs_list)
//! GET /{surface}/export/     streaming CSV
//! GET /{surface}/geolocation/ centroids of every match (object_count, object_list)
//! GET /brk/geolocation/      geometry summary for the map
//! ```
//!
//! The static `/brk/geolocation/` route takes priority over the surface
//! route, so cadastral map requests always get the geometry summary.

mod error;

pub use error::ApiError;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use ds_core::backend::{RecordStore, SearchBackend};
use ds_core::config::Config;
use ds_core::export::{encode_csv, ExportEngine};
use ds_core::geo::{GeoStore, GeoSummary, GeoSwitch};
use ds_core::hydrate::{Hydrator, ListingResponse, LocationResponse};
use ds_core::surface::Surfaces;
use ds_core::types::Params;
use futures::TryStreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Shared, read-only request context.
pub struct AppState {
    pub config: Config,
    pub surfaces: Surfaces,
    pub backend: Arc<dyn SearchBackend>,
    pub store: Arc<dyn RecordStore>,
    pub geo: Arc<dyn GeoStore>,
}

impl AppState {
    pub fn new(
        config: Config,
        backend: Arc<dyn SearchBackend>,
        store: Arc<dyn RecordStore>,
        geo: Arc<dyn GeoStore>,
    ) -> Result<Self, ds_core::Error> {
        let surfaces = Surfaces::from_config(&config)?;
        Ok(Self {
            config,
            surfaces,
            backend,
            store,
            geo,
        })
    }
}

type Shared = Arc<AppState>;
type Pairs = Query<Vec<(String, String)>>;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/brk/geolocation/", get(geolocation))
        .route("/{surface}/", get(listing))
        .route("/{surface}/export/", get(export))
        .route("/{surface}/geolocation/", get(locate))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let bind = state.config.server.bind.clone();
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!(%bind, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index(State(state): State<Shared>) -> Json<Value> {
    let names: Vec<&str> = state.surfaces.names().collect();
    Json(json!({ "surfaces": names }))
}

async fn listing(
    State(state): State<Shared>,
    Path(name): Path<String>,
    Query(pairs): Pairs,
) -> Result<Json<ListingResponse>, ApiError> {
    let surface = state.surfaces.get(&name)?;
    let params = Params::from_pairs(pairs);
    let hydrator = Hydrator::new(state.backend.as_ref(), state.store.as_ref(), &state.config.search);
    Ok(Json(hydrator.list(&surface, &params).await?))
}

async fn locate(
    State(state): State<Shared>,
    Path(name): Path<String>,
    Query(pairs): Pairs,
) -> Result<Json<LocationResponse>, ApiError> {
    let surface = state.surfaces.get(&name)?;
    let params = Params::from_pairs(pairs);
    let hydrator = Hydrator::new(state.backend.as_ref(), state.store.as_ref(), &state.config.search);
    Ok(Json(hydrator.locate(&surface, &params).await?))
}

async fn export(
    State(state): State<Shared>,
    Path(name): Path<String>,
    Query(pairs): Pairs,
) -> Result<Response, ApiError> {
    let surface = state.surfaces.get(&name)?;
    let params = Params::from_pairs(pairs);
    let engine = ExportEngine::new(
        Arc::clone(&state.backend),
        Arc::clone(&state.store),
        state.config.export.batch_size,
    );
    let filename = format!("attachment; filename=\"{name}.csv\"");
    let rows = engine.start(surface, &params).await?;
    let chunks = encode_csv(rows, state.config.export.delimiter)?
        .inspect_err(move |e| tracing::error!(surface = %name, error = %e, "export aborted mid-stream"));

    let headers = [
        (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
        (CONTENT_DISPOSITION, filename),
    ];
    Ok((headers, Body::from_stream(chunks)).into_response())
}

async fn geolocation(State(state): State<Shared>, Query(pairs): Pairs) -> Result<Json<GeoSummary>, ApiError> {
    let params = Params::from_pairs(pairs);
    let switch = GeoSwitch::new(state.config.geo.clone());
    Ok(Json(switch.summarize(&params, state.geo.as_ref()).await?))
}
