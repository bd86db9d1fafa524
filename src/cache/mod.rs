//! Edge cache
//!
//! The cache is an injected collaborator behind the `EdgeCache` trait.
//! Entries are whole responses keyed by the normalised request and are
//! overwritten, never merged.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::{
    HeaderName, IF_MATCH, IF_MODIFIED_SINCE, IF_NONE_MATCH, IF_RANGE, IF_UNMODIFIED_SINCE, RANGE,
};
use hyper::{HeaderMap, Method, Response, StatusCode, Uri};

pub use memory::MemoryEdgeCache;

use crate::http::body::{self, ResponseBody};

/// Request headers that select a different response for the same URL
static KEYED_HEADERS: [HeaderName; 6] = [
    RANGE,
    IF_RANGE,
    IF_MATCH,
    IF_NONE_MATCH,
    IF_MODIFIED_SINCE,
    IF_UNMODIFIED_SINCE,
];

/// Normalised request identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Method, path, query pairs in sorted order, then the keyed headers
    pub fn new(method: &Method, uri: &Uri, headers: &HeaderMap) -> Self {
        let mut key = format!("{method} {}", uri.path());

        if let Some(query) = uri.query().filter(|q| !q.is_empty()) {
            key.push('?');
            key.push_str(&normalize_query(query));
        }

        for name in &KEYED_HEADERS {
            for value in headers.get_all(name) {
                key.push('\n');
                key.push_str(name.as_str());
                key.push_str(": ");
                key.push_str(&String::from_utf8_lossy(value.as_bytes()));
            }
        }

        Self(key)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Keyed headers are on their own lines; keep log lines single-line
        f.write_str(&self.0.replace('\n', " | "))
    }
}

fn normalize_query(query: &str) -> String {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
        Ok(mut pairs) => {
            pairs.sort();
            serde_urlencoded::to_string(&pairs).unwrap_or_else(|_| query.to_string())
        }
        Err(_) => query.to_string(),
    }
}

/// A fully buffered response
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    /// Only successful and 304 responses are replayed
    pub fn is_servable(&self) -> bool {
        self.status.is_success() || self.status == StatusCode::NOT_MODIFIED
    }

    pub fn to_response(&self) -> Response<ResponseBody> {
        let mut response = Response::new(body::full(self.body.clone()));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers.clone();
        response
    }
}

/// Edge cache collaborator
#[async_trait]
pub trait EdgeCache: Send + Sync {
    async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse>;

    /// Best effort; returns whether the response was kept
    async fn store(&self, key: CacheKey, response: CachedResponse) -> bool;
}
