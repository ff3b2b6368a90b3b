//! Elasticsearch adapter over a plain hyper client.
//!
//! Listings use `POST /{index}/_search`; exports use the scroll API
//! (`?scroll=`, `POST /_search/scroll`, `DELETE /_search/scroll`). Every
//! request is bounded by the configured timeout. The client speaks plain
//! HTTP only; an `https://` cluster URL is rejected at construction.

use async_trait::async_trait;
use bytes::Bytes;
use ds_core::backend::{ExportCursor, SearchBackend};
use ds_core::config::ElasticConfig;
use ds_core::error::{ConfigError, SearchError};
use ds_core::query::QueryDocument;
use ds_core::types::{Hit, SearchResults};
use http_body_util::{BodyExt, Full};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::{json, Value};
use std::time::Duration;

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct Transport {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
    timeout: Duration,
}

impl Transport {
    async fn call(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value, SearchError> {
        let uri = format!("{}{}", self.base_url, path);
        let payload = match body {
            Some(b) => Bytes::from(serde_json::to_vec(b)?),
            None => Bytes::new(),
        };
        let request = Request::builder()
            .method(method.clone())
            .uri(&uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(payload))
            .map_err(|e| SearchError::Unavailable(e.to_string()))?;

        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| SearchError::Unavailable(e.to_string()))?;
            let status = response.status();
            let bytes = response
                .into_body()
                .collect()
                .await
                .map_err(|e| SearchError::Unavailable(e.to_string()))?
                .to_bytes();
            Ok::<_, SearchError>((status, bytes))
        };
        let (status, bytes) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| SearchError::Timeout {
                seconds: self.timeout.as_secs(),
            })??;

        tracing::trace!(%method, %uri, status = status.as_u16(), bytes = bytes.len(), "elastic call");
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

// ---------------------------------------------------------------------------
// Response decoding
// ---------------------------------------------------------------------------

/// `hits.total` is a number on old clusters and `{value, relation}` on new ones.
fn total_of(hits: &Value) -> u64 {
    match hits.get("total") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::Object(o)) => o.get("value").and_then(Value::as_u64).unwrap_or(0),
        _ => 0,
    }
}

fn hits_of(hits: &Value) -> Result<Vec<Hit>, SearchError> {
    let Some(items) = hits.get("hits").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|item| {
            let id = match item.get("_id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => return Err(SearchError::Decode("hit without _id".to_string())),
            };
            let source = item
                .get("_source")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            Ok(Hit { id, source })
        })
        .collect()
}

pub(crate) fn decode_results(body: &Value) -> Result<SearchResults, SearchError> {
    let hits = body
        .get("hits")
        .ok_or_else(|| SearchError::Decode("response has no hits".to_string()))?;
    Ok(SearchResults {
        total: total_of(hits),
        hits: hits_of(hits)?,
        aggregations: body.get("aggregations").cloned(),
    })
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ElasticBackend {
    transport: Transport,
    scroll_keepalive: String,
}

impl ElasticBackend {
    pub fn new(config: &ElasticConfig) -> Result<Self, ConfigError> {
        let base_url = http_base_url(&config.url)?;
        let client = Client::builder(TokioExecutor::new()).build_http();
        Ok(Self {
            transport: Transport {
                client,
                base_url,
                timeout: Duration::from_secs(config.timeout_secs.max(1)),
            },
            scroll_keepalive: config.scroll_keepalive.clone(),
        })
    }
}

/// `url` without its trailing slash, provided it is an `http://` URL with a host.
fn http_base_url(url: &str) -> Result<String, ConfigError> {
    let invalid = |message: &str| ConfigError::ElasticUrl {
        url: url.to_string(),
        message: message.to_string(),
    };
    let uri: Uri = url.parse().map_err(|_| invalid("not a valid URL"))?;
    match uri.scheme_str() {
        Some("http") => {}
        Some(_) => return Err(invalid("only http:// is supported")),
        None => return Err(invalid("missing http:// scheme")),
    }
    if uri.authority().is_none() {
        return Err(invalid("missing host"));
    }
    Ok(url.trim_end_matches('/').to_string())
}

#[async_trait]
impl SearchBackend for ElasticBackend {
    async fn search(&self, index: &str, document: &QueryDocument) -> Result<SearchResults, SearchError> {
        let body = self
            .transport
            .call(Method::POST, &format!("/{index}/_search"), Some(&document.to_json()))
            .await?;
        decode_results(&body)
    }

    async fn open_cursor(
        &self,
        index: &str,
        document: &QueryDocument,
        page_size: usize,
    ) -> Result<Box<dyn ExportCursor>, SearchError> {
        let mut document = document.clone();
        document.strip_window();
        document.size = Some(page_size as u64);

        let path = format!("/{index}/_search?scroll={}", self.scroll_keepalive);
        let body = self.transport.call(Method::POST, &path, Some(&document.to_json())).await?;
        let first = decode_results(&body)?;
        let scroll_id = body.get("_scroll_id").and_then(Value::as_str).map(str::to_string);
        tracing::debug!(index, total = first.total, "scroll opened");

        Ok(Box::new(ScrollCursor {
            transport: self.transport.clone(),
            keepalive: self.scroll_keepalive.clone(),
            scroll_id,
            first_page: Some(first.hits),
        }))
    }
}

// ---------------------------------------------------------------------------
// Scroll cursor
// ---------------------------------------------------------------------------

struct ScrollCursor {
    transport: Transport,
    keepalive: String,
    /// `None` once cleared.
    scroll_id: Option<String>,
    first_page: Option<Vec<Hit>>,
}

impl ScrollCursor {
    fn clear_body(id: &str) -> Value {
        json!({ "scroll_id": [id] })
    }
}

#[async_trait]
impl ExportCursor for ScrollCursor {
    async fn next_page(&mut self) -> Result<Vec<Hit>, SearchError> {
        if let Some(page) = self.first_page.take() {
            return Ok(page);
        }
        let Some(id) = self.scroll_id.as_deref() else {
            return Ok(Vec::new());
        };
        let body = self
            .transport
            .call(
                Method::POST,
                "/_search/scroll",
                Some(&json!({ "scroll": self.keepalive, "scroll_id": id })),
            )
            .await?;
        if let Some(next) = body.get("_scroll_id").and_then(Value::as_str) {
            self.scroll_id = Some(next.to_string());
        }
        Ok(decode_results(&body)?.hits)
    }

    async fn close(mut self: Box<Self>) -> Result<(), SearchError> {
        if let Some(id) = self.scroll_id.take() {
            self.transport
                .call(Method::DELETE, "/_search/scroll", Some(&Self::clear_body(&id)))
                .await?;
            tracing::debug!("scroll cleared");
        }
        Ok(())
    }
}

impl Drop for ScrollCursor {
    /// A cursor dropped mid-export still holds a server-side scroll context;
    /// clear it in the background.
    fn drop(&mut self) {
        let Some(id) = self.scroll_id.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no runtime to clear abandoned scroll; it will expire on its own");
            return;
        };
        let transport = self.transport.clone();
        handle.spawn(async move {
            match transport
                .call(Method::DELETE, "/_search/scroll", Some(&ScrollCursor::clear_body(&id)))
                .await
            {
                Ok(_) => tracing::debug!("abandoned scroll cleared"),
                Err(e) => tracing::warn!(error = %e, "could not clear abandoned scroll"),
            }
        });
    }
}
