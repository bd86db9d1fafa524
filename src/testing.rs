//! Test doubles shared across modules

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use hyper::Response;

use crate::error::BackendError;
use crate::http::ResponseBody;
use crate::storage::{BlobStore, GetOptions, GetOutcome, MemoryBlobStore, ObjectMetadata};

/// 2024-01-01 12:00:00 UTC
pub fn sample_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub async fn body_bytes(response: Response<ResponseBody>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Head(String),
    Get(String, GetOptions),
}

/// Memory store that records every call and can fail on demand
#[derive(Default)]
pub struct RecordingStore {
    inner: MemoryBlobStore,
    failures: AtomicUsize,
    calls: Mutex<Vec<Call>>,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn put(&self, key: &str, data: impl Into<Bytes>, last_modified: DateTime<Utc>) -> ObjectMetadata {
        self.inner.put(key, data, last_modified).await
    }

    /// Fail the next `count` calls with `BackendError::Unavailable`
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) -> Result<(), BackendError> {
        self.calls.lock().unwrap().push(call);
        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(BackendError::Unavailable("injected failure".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl BlobStore for RecordingStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, BackendError> {
        self.record(Call::Head(key.to_string()))?;
        self.inner.head(key).await
    }

    async fn get(
        &self,
        key: &str,
        options: &GetOptions,
    ) -> Result<Option<GetOutcome>, BackendError> {
        self.record(Call::Get(key.to_string(), options.clone()))?;
        self.inner.get(key, options).await
    }
}
