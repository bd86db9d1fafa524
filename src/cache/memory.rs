//! In-memory edge cache
//!
//! Freshness comes from the stored response's own `cache-control`:
//! `s-maxage` over `max-age`, no directive keeps the entry until it is
//! evicted.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use hyper::header::CACHE_CONTROL;
use hyper::HeaderMap;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{CacheKey, CachedResponse, EdgeCache};
use crate::config::CacheConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    Uncacheable,
    Indefinite,
    For(Duration),
}

struct Entry {
    response: CachedResponse,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

struct Inner {
    lru: LruCache<CacheKey, Entry>,
    bytes_in_use: usize,
}

impl Inner {
    fn remove(&mut self, key: &CacheKey) {
        if let Some(removed) = self.lru.pop(key) {
            self.bytes_in_use = self.bytes_in_use.saturating_sub(removed.response.body.len());
        }
    }
}

/// Bounded by entry count and total body bytes; least recently used
/// entries are evicted first.
pub struct MemoryEdgeCache {
    inner: Mutex<Inner>,
    max_entry_bytes: usize,
    max_total_bytes: usize,
}

impl MemoryEdgeCache {
    pub const DEFAULT_MAX_ENTRIES: usize = 1024;
    pub const DEFAULT_MAX_TOTAL_BYTES: usize = 512 * 1024 * 1024;

    pub fn new(max_entry_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                lru: LruCache::new(capacity(Self::DEFAULT_MAX_ENTRIES)),
                bytes_in_use: 0,
            }),
            max_entry_bytes,
            max_total_bytes: Self::DEFAULT_MAX_TOTAL_BYTES,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entry_bytes)
            .with_max_entries(config.max_entries)
            .with_max_total_bytes(config.max_total_bytes)
    }

    /// Set the maximum number of entries (at least one).
    #[must_use]
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.inner.get_mut().lru.resize(capacity(max));
        self
    }

    /// Set the maximum sum of stored body sizes.
    #[must_use]
    pub fn with_max_total_bytes(mut self, max: usize) -> Self {
        self.max_total_bytes = max;
        self
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.lru.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.lru.is_empty()
    }

    /// Sum of the stored body sizes
    pub async fn total_bytes(&self) -> usize {
        self.inner.lock().await.bytes_in_use
    }
}

fn capacity(max: usize) -> NonZeroUsize {
    NonZeroUsize::new(max).unwrap_or(NonZeroUsize::MIN)
}

fn freshness(headers: &HeaderMap) -> Freshness {
    let mut max_age = None;
    let mut shared_max_age = None;

    for value in headers.get_all(CACHE_CONTROL) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for directive in value.split(',') {
            let directive = directive.trim().to_ascii_lowercase();
            match directive.split_once('=') {
                None if directive == "no-store" || directive == "private" => {
                    return Freshness::Uncacheable;
                }
                Some(("max-age", secs)) => max_age = secs.trim_matches('"').parse::<u64>().ok(),
                Some(("s-maxage", secs)) => {
                    shared_max_age = secs.trim_matches('"').parse::<u64>().ok();
                }
                _ => {}
            }
        }
    }

    match shared_max_age.or(max_age) {
        Some(0) => Freshness::Uncacheable,
        Some(secs) => Freshness::For(Duration::from_secs(secs)),
        None => Freshness::Indefinite,
    }
}

#[async_trait]
impl EdgeCache for MemoryEdgeCache {
    async fn lookup(&self, key: &CacheKey) -> Option<CachedResponse> {
        let now = Instant::now();
        let mut inner = self.inner.lock().await;
        match inner.lru.get(key) {
            None => None,
            Some(entry) if !entry.is_expired(now) => Some(entry.response.clone()),
            Some(_) => {
                inner.remove(key);
                None
            }
        }
    }

    async fn store(&self, key: CacheKey, response: CachedResponse) -> bool {
        let size = response.body.len();
        if size > self.max_entry_bytes || size > self.max_total_bytes {
            return false;
        }
        let expires_at = match freshness(&response.headers) {
            Freshness::Uncacheable => return false,
            Freshness::Indefinite => None,
            Freshness::For(ttl) => Some(Instant::now() + ttl),
        };

        let mut inner = self.inner.lock().await;
        inner.remove(&key);
        inner.bytes_in_use += size;
        if let Some((_, evicted)) = inner.lru.push(key, Entry { response, expires_at }) {
            inner.bytes_in_use = inner.bytes_in_use.saturating_sub(evicted.response.body.len());
        }
        while inner.bytes_in_use > self.max_total_bytes {
            let Some((_, evicted)) = inner.lru.pop_lru() else {
                break;
            };
            inner.bytes_in_use = inner.bytes_in_use.saturating_sub(evicted.response.body.len());
        }
        true
    }
}
