//! In-memory blob store

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::stream;
use tokio::sync::RwLock;

use super::{
    content_etag, read_window, BlobStore, ByteStream, GetOptions, GetOutcome, ObjectBody,
    ObjectMetadata,
};
use crate::error::BackendError;

const CHUNK_SIZE: usize = 64 * 1024;

struct StoredObject {
    metadata: ObjectMetadata,
    data: Bytes,
}

/// Blob store keeping every object in memory
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `data` under `key` with a content-derived etag
    pub async fn put(
        &self,
        key: &str,
        data: impl Into<Bytes>,
        last_modified: DateTime<Utc>,
    ) -> ObjectMetadata {
        let data = data.into();
        let metadata = ObjectMetadata::new(key, 0, content_etag(&data), last_modified);
        self.insert(metadata, data).await
    }

    /// Store `data` with caller-supplied metadata; the size is taken from `data`
    pub async fn insert(&self, mut metadata: ObjectMetadata, data: impl Into<Bytes>) -> ObjectMetadata {
        let data = data.into();
        metadata.size = data.len() as u64;
        self.objects.write().await.insert(
            metadata.key.clone(),
            StoredObject {
                metadata: metadata.clone(),
                data,
            },
        );
        metadata
    }
}

fn chunked(data: Bytes) -> ByteStream {
    let chunks: Vec<Result<Bytes, std::io::Error>> = (0..data.len())
        .step_by(CHUNK_SIZE)
        .map(|start| Ok(data.slice(start..data.len().min(start + CHUNK_SIZE))))
        .collect();
    Box::pin(stream::iter(chunks))
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, BackendError> {
        let objects = self.objects.read().await;
        Ok(objects.get(key).map(|object| object.metadata.clone()))
    }

    async fn get(
        &self,
        key: &str,
        options: &GetOptions,
    ) -> Result<Option<GetOutcome>, BackendError> {
        let objects = self.objects.read().await;
        let Some(object) = objects.get(key) else {
            return Ok(None);
        };

        if !options.only_if.evaluate(&object.metadata) {
            return Ok(Some(GetOutcome::Metadata(object.metadata.clone())));
        }

        let (start, length) = read_window(options.range.as_ref(), object.metadata.size);
        #[allow(clippy::cast_possible_truncation)]
        let slice = object
            .data
            .slice(start as usize..(start + length) as usize);

        Ok(Some(GetOutcome::Body(ObjectBody {
            metadata: object.metadata.clone(),
            body: chunked(slice),
        })))
    }
}
