//! Backend client
//!
//! Wraps the injected `BlobStore` so every call goes through the configured
//! retry policy.

pub mod retry;

use std::sync::Arc;

pub use retry::RetryPolicy;

use crate::error::BackendError;
use crate::storage::{BlobStore, GetOptions, GetOutcome, ObjectMetadata};

/// Blob store access with retries
#[derive(Clone)]
pub struct ResilientClient {
    store: Arc<dyn BlobStore>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(store: Arc<dyn BlobStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, BackendError> {
        retry::execute(&self.policy, "head", key, || self.store.head(key)).await
    }

    /// A failed `only_if` condition is a successful call and is not retried
    pub async fn get(
        &self,
        key: &str,
        options: &GetOptions,
    ) -> Result<Option<GetOutcome>, BackendError> {
        retry::execute(&self.policy, "get", key, || self.store.get(key, options)).await
    }
}
