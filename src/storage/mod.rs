//! Blob store module
//!
//! The read-only object store the gateway fronts. The engine only sees the
//! `BlobStore` trait, so the backing implementation is injected at startup
//! (filesystem) or in tests (memory).

pub mod fs;
pub mod memory;

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::Stream;

use crate::error::BackendError;
use crate::http::range::EffectiveRange;

pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// Key of an object in the store, computed once per request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Object metadata as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub key: String,
    pub size: u64,
    /// Strong validator, stored without quotes
    pub etag: String,
    pub last_modified: DateTime<Utc>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_language: Option<String>,
    pub content_disposition: Option<String>,
    pub cache_control: Option<String>,
    pub cache_expiry: Option<DateTime<Utc>>,
}

impl ObjectMetadata {
    pub fn new(
        key: impl Into<String>,
        size: u64,
        etag: impl Into<String>,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            key: key.into(),
            size,
            etag: etag.into(),
            last_modified,
            content_type: None,
            content_encoding: None,
            content_language: None,
            content_disposition: None,
            cache_control: None,
            cache_expiry: None,
        }
    }

    /// Etag in its quoted header form
    pub fn http_etag(&self) -> String {
        format!("\"{}\"", self.etag)
    }
}

/// Object content paired with its metadata
pub struct ObjectBody {
    pub metadata: ObjectMetadata,
    pub body: ByteStream,
}

impl fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBody")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// Result of a `get` call on an existing object
#[derive(Debug)]
pub enum GetOutcome {
    /// The `only_if` condition failed, nothing was transferred
    Metadata(ObjectMetadata),
    Body(ObjectBody),
}

impl GetOutcome {
    pub const fn metadata(&self) -> &ObjectMetadata {
        match self {
            Self::Metadata(metadata) => metadata,
            Self::Body(body) => &body.metadata,
        }
    }

    pub const fn has_body(&self) -> bool {
        matches!(self, Self::Body(_))
    }

    /// Drop the body, if any
    pub fn into_metadata(self) -> ObjectMetadata {
        match self {
            Self::Metadata(metadata) => metadata,
            Self::Body(body) => body.metadata,
        }
    }
}

/// Conditions evaluated by the store before transferring content
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditional {
    pub etag_matches: Option<String>,
    pub etag_does_not_match: Option<String>,
    pub uploaded_before: Option<DateTime<Utc>>,
    pub uploaded_after: Option<DateTime<Utc>>,
}

impl Conditional {
    /// Whether `metadata` satisfies every condition
    ///
    /// Dates compare at whole-second precision, the resolution of HTTP dates.
    pub fn evaluate(&self, metadata: &ObjectMetadata) -> bool {
        let etag_equals = |tag: &str| tag == "*" || tag == metadata.etag;
        let modified = metadata.last_modified.timestamp();

        if let Some(tag) = &self.etag_matches {
            if !etag_equals(tag) {
                return false;
            }
        }
        if let Some(tag) = &self.etag_does_not_match {
            if etag_equals(tag) {
                return false;
            }
        }
        if let Some(before) = self.uploaded_before {
            if modified > before.timestamp() {
                return false;
            }
        }
        if let Some(after) = self.uploaded_after {
            if modified <= after.timestamp() {
                return false;
            }
        }
        true
    }
}

/// Options of a `get` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub range: Option<EffectiveRange>,
    pub only_if: Conditional,
}

impl GetOptions {
    pub const fn ranged(range: Option<EffectiveRange>) -> Self {
        Self {
            range,
            only_if: Conditional {
                etag_matches: None,
                etag_does_not_match: None,
                uploaded_before: None,
                uploaded_after: None,
            },
        }
    }
}

/// Read-only blob store
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Metadata of `key`, `None` when absent
    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, BackendError>;

    /// Content of `key`
    ///
    /// Returns `GetOutcome::Metadata` exactly when `options.only_if` fails.
    async fn get(&self, key: &str, options: &GetOptions)
        -> Result<Option<GetOutcome>, BackendError>;
}

/// Resolve the `(start, length)` to read for `range` on an object of `size`
pub fn read_window(range: Option<&EffectiveRange>, size: u64) -> (u64, u64) {
    match range {
        None => (0, size),
        Some(range) => {
            let (start, end) = range.bounds(size);
            let start = start.min(size);
            let end = end.min(size.saturating_sub(1));
            if size == 0 || start > end {
                (start, 0)
            } else {
                (start, end - start + 1)
            }
        }
    }
}

/// Content-derived etag (hex, unquoted)
pub fn content_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
