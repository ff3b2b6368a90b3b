#![allow(unused)]
//! HTTP surface integration harness.
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot`
//! against the demo fixtures in `fixtures/amsterdam.json`.
//!
//! # What this covers
//!
//! - **Listing**: JSON body shape, filters from the query string, repeated
//!   parameters (last one wins).
//! - **Export**: CSV content type, attachment name, body lines.
//! - **Geolocation**: grouped summary and the 400 for a missing bbox;
//!   surface centroid search narrowed by a polygon parameter.
//! - **Error mapping**: unknown surface 404, client error 400, search
//!   backend failure 502, all with a `{"detail": ...}` body.
//!
//! # What this does NOT cover
//!
//! - Pipeline semantics in depth (see query/hydrate/export/geo harnesses)
//! - Graceful shutdown of the bound server
//!
//! # Running
//!
//! ```sh
//! cargo test --test api_harness
//! ```

mod common;
use common::*;

use axum::body::Body;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{Request, StatusCode};
use axum::Router;
use dataselectie::{build_state, DataSource};
use ds_api::{router, AppState};
use ds_backends::{MemoryGeoStore, MemoryIndex, MemoryRecordStore};
use ds_core::config::Config;
use http_body_util::BodyExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceExt;

fn demo_app() -> Router {
    let source = DataSource {
        fixtures: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/amsterdam.json")),
        elastic: false,
    };
    let state = build_state(Config::defaults(), &source).unwrap();
    router(Arc::new(state))
}

fn empty_app() -> Router {
    let state = AppState::new(
        Config::defaults(),
        Arc::new(MemoryIndex::new()),
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryGeoStore::new()),
    )
    .unwrap();
    router(Arc::new(state))
}

async fn get(app: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn index_lists_surfaces() {
    let (status, body) = get_json(demo_app(), "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "surfaces": ["bag", "brk", "hr"] }));
}

#[tokio::test]
async fn listing_returns_hydrated_rows() {
    let (status, body) = get_json(demo_app(), "/bag/?stadsdeel_code=A").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object_count"], json!(3));
    assert_eq!(body["page_count"], json!(1));
    let streets: Vec<&str> = body["object_list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["_openbare_ruimte_naam"].as_str().unwrap())
        .collect();
    assert_eq!(streets, vec!["Dam", "Dam", "Damrak"]);
    assert_eq!(body["object_list"][1]["huisletter"], json!("A"));
    assert_eq!(body["object_list"][0]["begin_geldigheid"], json!("01-06-2010"));
    assert_eq!(body["aggs_list"]["stadsdeel_code"]["buckets"], json!([{ "key": "A", "doc_count": 3 }]));
}

#[tokio::test]
async fn repeated_parameter_last_one_wins() {
    let (_, body) = get_json(demo_app(), "/bag/?stadsdeel_code=A&stadsdeel_code=F").await;
    assert_eq!(body["object_count"], json!(1));
    assert_eq!(body["object_list"][0]["postcode"], json!("1064SW"));
}

#[tokio::test]
async fn nested_filter_is_echoed_as_selected() {
    let (status, body) = get_json(demo_app(), "/hr/?subcategorie=restaurant").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object_count"], json!(1));
    assert_eq!(body["object_list"][0]["kvk_nummer"], json!("34987654"));
    assert_eq!(body["object_list"][0]["non_mailing"], json!("true"));
    assert_eq!(body["aggs_list"]["subcategorie"]["selected"], json!("restaurant"));
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_streams_csv() {
    let (status, headers, body) = get(demo_app(), "/bag/export/?stadsdeel_code=F").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[CONTENT_TYPE], "text/csv; charset=utf-8");
    assert_eq!(headers[CONTENT_DISPOSITION], "attachment; filename=\"bag.csv\"");

    let text = String::from_utf8(body).unwrap();
    let lines: Vec<&str> = text.split_terminator("\r\n").collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Naam openbare ruimte;Huisnummer;"));
    assert_eq!(
        lines[1],
        "Plein '40-'45;1;;;1064SW;Amsterdam;Nieuw-West;F;Slotermeer-Noordoost;F76;Slotermeer-Noordoost;F76a;15-03-2012"
    );
}

#[tokio::test]
async fn export_open_failure_is_an_error_status() {
    let (status, headers, body) = get(empty_app(), "/bag/export/").await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(headers[CONTENT_TYPE], "application/json");
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert!(body["detail"].as_str().unwrap().contains("ds_index"));
}

// ---------------------------------------------------------------------------
// Geolocation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn geolocation_grouped_summary() {
    let (status, body) = get_json(demo_app(), "/brk/geolocation/?zoom=8").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appartementen"], json!([]));
    assert_eq!(body["eigenpercelen"]["type"], json!("GeometryCollection"));
    assert_eq!(body["eigenpercelen"]["geometries"].as_array().unwrap().len(), 2);
    assert_eq!(body["niet_eigenpercelen"]["geometries"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn geolocation_detail_by_area() {
    let (status, body) = get_json(demo_app(), "/brk/geolocation/?zoom=16&buurt=A00a").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appartementen"].as_array().unwrap().len(), 1);
    assert_eq!(body["eigenpercelen"]["geometries"].as_array().unwrap().len(), 1);
    assert_eq!(body["niet_eigenpercelen"], Value::Null);
}

#[tokio::test]
async fn geolocation_without_bbox_is_a_bad_request() {
    let (status, body) = get_json(demo_app(), "/brk/geolocation/?zoom=14").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("bounding box required"));
}

/// `[[4.88,52.37],[4.90,52.37],[4.90,52.38],[4.88,52.38]]`, around the Dam.
const DAM_SQUARE: &str = "%5B%5B4.88%2C52.37%5D%2C%5B4.90%2C52.37%5D%2C%5B4.90%2C52.38%5D%2C%5B4.88%2C52.38%5D%5D";

#[tokio::test]
async fn surface_geolocation_lists_centroids() {
    let (status, body) = get_json(demo_app(), "/bag/geolocation/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object_count"], json!(4));
    assert_eq!(
        body["object_list"][0],
        json!({ "id": "0363200000006110", "centroid": [4.8932, 52.3731] })
    );
    assert!(body.get("aggs_list").is_none());
}

#[tokio::test]
async fn polygon_parameter_narrows_geolocation_and_listing() {
    let (_, located) = get_json(demo_app(), &format!("/bag/geolocation/?shape={DAM_SQUARE}")).await;
    assert_eq!(located["object_count"], json!(3));

    let (_, listed) = get_json(demo_app(), &format!("/bag/?shape={DAM_SQUARE}")).await;
    assert_eq!(listed["object_count"], json!(3));

    // Two points are not a polygon; the parameter is ignored.
    let (_, ignored) = get_json(demo_app(), "/bag/geolocation/?shape=%5B%5B4.88%2C52.37%5D%2C%5B4.90%2C52.38%5D%5D").await;
    assert_eq!(ignored["object_count"], json!(4));
}

#[tokio::test]
async fn documents_without_centroid_locate_as_null() {
    let (status, body) = get_json(demo_app(), "/hr/geolocation/").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object_count"], json!(2));
    assert_eq!(body["object_list"][0]["centroid"], Value::Null);
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_surface_is_not_found() {
    let (status, body) = get_json(demo_app(), "/wkpb/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "detail": "unknown search surface: wkpb" }));
}

#[tokio::test]
async fn search_backend_failure_is_bad_gateway() {
    let (status, body) = get_json(empty_app(), "/bag/").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["detail"].as_str().unwrap().starts_with("search backend returned status 404"));
}
