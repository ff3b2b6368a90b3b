//! Fake Elasticsearch server for integration tests.
//!
//! Spins up a minimal `axum` HTTP server on a random TCP port bound to
//! 127.0.0.1. Serves:
//! - `POST /{index}/_search`: all configured hits, or the first scroll page
//!   when `?scroll=` is given
//! - `POST /_search/scroll`: the next scroll page
//! - `DELETE /_search/scroll`: records the cleared scroll ids
//!
//! Every request body is recorded so tests can assert on the wire format.
//!
//! # Example
//!
//! ```rust,no_run
//! let es = FakeElastic::start(vec![json!({ "_id": "1", "_source": {} })]).await.unwrap();
//! let backend = ElasticBackend::new(&es.config()).unwrap();
//! ```

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use ds_core::config::ElasticConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

pub const SCROLL_ID: &str = "scroll-abc";

#[derive(Default)]
struct EsState {
    hits: Vec<Value>,
    /// Next scroll position and page size.
    scroll: Option<(usize, usize)>,
    requests: Vec<(String, Value)>,
    cleared: Vec<String>,
    fail_status: Option<u16>,
    delay: Option<Duration>,
}

/// Handle to the running fake Elasticsearch server.
pub struct FakeElastic {
    addr: SocketAddr,
    state: Arc<Mutex<EsState>>,
}

impl FakeElastic {
    /// Start on a random port serving `hits` (each `{_id, _source}`).
    pub async fn start(hits: Vec<Value>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let state = Arc::new(Mutex::new(EsState {
            hits,
            ..EsState::default()
        }));

        let app = Router::new()
            .route("/_search/scroll", post(scroll_next).delete(scroll_clear))
            .route("/{index}/_search", post(search))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        tokio::time::sleep(Duration::from_millis(5)).await;

        Ok(Self { addr, state })
    }

    pub fn config(&self) -> ElasticConfig {
        ElasticConfig {
            url: format!("http://{}/", self.addr),
            timeout_secs: 1,
            scroll_keepalive: "1m".to_string(),
        }
    }

    /// Answer every request with `status`.
    pub async fn fail_with(&self, status: u16) {
        self.state.lock().await.fail_status = Some(status);
    }

    /// Delay every answer.
    pub async fn delay(&self, delay: Duration) {
        self.state.lock().await.delay = Some(delay);
    }

    /// `(path, body)` of every request, in arrival order.
    pub async fn requests(&self) -> Vec<(String, Value)> {
        self.state.lock().await.requests.clone()
    }

    pub async fn cleared(&self) -> Vec<String> {
        self.state.lock().await.cleared.clone()
    }

    /// Poll until a scroll clear arrives or `timeout` passes.
    pub async fn wait_for_clear(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            if !self.cleared().await.is_empty() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

async fn prelude(state: &Arc<Mutex<EsState>>, path: String, body: Value) -> Option<StatusCode> {
    let (delay, status) = {
        let mut s = state.lock().await;
        s.requests.push((path, body));
        (s.delay, s.fail_status)
    };
    if let Some(d) = delay {
        tokio::time::sleep(d).await;
    }
    status.map(|code| StatusCode::from_u16(code).unwrap())
}

fn page(hits: &[Value], total: usize, scroll: bool) -> Value {
    let mut body = json!({ "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits } });
    if scroll {
        body["_scroll_id"] = json!(SCROLL_ID);
    }
    body
}

async fn search(
    Path(index): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<Arc<Mutex<EsState>>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let size = body.get("size").and_then(Value::as_u64).unwrap_or(10) as usize;
    let from = body.get("from").and_then(Value::as_u64).unwrap_or(0) as usize;
    if let Some(status) = prelude(&state, format!("/{index}/_search"), body).await {
        return (status, Json(json!({ "error": "unavailable" })));
    }

    let mut s = state.lock().await;
    let total = s.hits.len();
    if query.contains_key("scroll") {
        let first: Vec<Value> = s.hits.iter().take(size).cloned().collect();
        s.scroll = Some((first.len(), size));
        return (StatusCode::OK, Json(page(&first, total, true)));
    }
    let window: Vec<Value> = s.hits.iter().skip(from).take(size).cloned().collect();
    (StatusCode::OK, Json(page(&window, total, false)))
}

async fn scroll_next(State(state): State<Arc<Mutex<EsState>>>, Json(body): Json<Value>) -> impl IntoResponse {
    if let Some(status) = prelude(&state, "/_search/scroll".to_string(), body).await {
        return (status, Json(json!({ "error": "unavailable" })));
    }
    let mut s = state.lock().await;
    let total = s.hits.len();
    let (pos, size) = s.scroll.unwrap_or((total, 10));
    let next: Vec<Value> = s.hits.iter().skip(pos).take(size).cloned().collect();
    s.scroll = Some((pos + next.len(), size));
    (StatusCode::OK, Json(page(&next, total, true)))
}

async fn scroll_clear(State(state): State<Arc<Mutex<EsState>>>, Json(body): Json<Value>) -> impl IntoResponse {
    let ids: Vec<String> = body
        .get("scroll_id")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let mut s = state.lock().await;
    s.requests.push(("DELETE /_search/scroll".to_string(), body));
    s.cleared.extend(ids);
    Json(json!({ "succeeded": true }))
}
