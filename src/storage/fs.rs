//! Filesystem blob store
//!
//! Serves objects from files below a root directory. Metadata comes from
//! the filesystem: the etag is derived from key, size and modification
//! time, the content type from the key's extension.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::{self, SeekFrom};
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use super::{read_window, BlobStore, GetOptions, GetOutcome, ObjectBody, ObjectMetadata};
use crate::error::BackendError;
use crate::http::mime;

/// Blob store backed by a directory
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a key to a path below the root, refusing traversal
    fn resolve(&self, key: &str) -> Result<PathBuf, BackendError> {
        let relative = Path::new(key);
        let safe = !key.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !safe {
            return Err(BackendError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn metadata_for(&self, key: &str) -> Result<Option<ObjectMetadata>, BackendError> {
        let path = self.resolve(key)?;
        let fs_meta = match fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let modified = fs_meta.modified()?;
        let last_modified = DateTime::<Utc>::from(modified);
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        fs_meta.len().hash(&mut hasher);
        nanos.hash(&mut hasher);

        let mut metadata = ObjectMetadata::new(
            key,
            fs_meta.len(),
            format!("{:016x}", hasher.finish()),
            last_modified,
        );
        metadata.content_type = Some(mime::content_type_for_key(key).to_string());
        Ok(Some(metadata))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn head(&self, key: &str) -> Result<Option<ObjectMetadata>, BackendError> {
        self.metadata_for(key).await
    }

    async fn get(
        &self,
        key: &str,
        options: &GetOptions,
    ) -> Result<Option<GetOutcome>, BackendError> {
        let Some(metadata) = self.metadata_for(key).await? else {
            return Ok(None);
        };

        if !options.only_if.evaluate(&metadata) {
            return Ok(Some(GetOutcome::Metadata(metadata)));
        }

        let (start, length) = read_window(options.range.as_ref(), metadata.size);
        let mut file = fs::File::open(self.resolve(key)?).await?;
        if start > 0 {
            file.seek(SeekFrom::Start(start)).await?;
        }

        Ok(Some(GetOutcome::Body(ObjectBody {
            metadata,
            body: Box::pin(ReaderStream::new(file.take(length))),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::range::EffectiveRange;
    use crate::storage::Conditional;
    use bytes::Bytes;
    use futures_util::TryStreamExt;

    fn temp_root(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("isogate-fs-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_head_reads_filesystem_metadata() {
        let root = temp_root("head");
        std::fs::write(root.join("keyring.gpg"), b"public key").unwrap();
        let store = FsBlobStore::new(&root);

        let meta = store.head("keyring.gpg").await.unwrap().unwrap();
        assert_eq!(meta.size, 10);
        assert_eq!(meta.content_type.as_deref(), Some("application/pgp-keys"));
        assert_eq!(meta, store.head("keyring.gpg").await.unwrap().unwrap());
        assert!(store.head("absent.iso").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ranged_read() {
        let root = temp_root("range");
        std::fs::write(root.join("a.iso"), b"0123456789").unwrap();
        let store = FsBlobStore::new(&root);

        let options = GetOptions::ranged(Some(EffectiveRange::Offset {
            offset: 3,
            length: 4,
        }));
        match store.get("a.iso", &options).await.unwrap() {
            Some(GetOutcome::Body(object)) => {
                let chunks: Vec<Bytes> = object.body.try_collect().await.unwrap();
                assert_eq!(chunks.concat(), b"3456");
            }
            other => panic!("Expected body, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_condition_failure() {
        let root = temp_root("cond");
        std::fs::write(root.join("a.iso"), b"data").unwrap();
        let store = FsBlobStore::new(&root);
        let meta = store.head("a.iso").await.unwrap().unwrap();

        let options = GetOptions {
            range: None,
            only_if: Conditional {
                etag_matches: Some("not-the-etag".into()),
                ..Conditional::default()
            },
        };
        assert!(matches!(
            store.get("a.iso", &options).await.unwrap(),
            Some(GetOutcome::Metadata(m)) if m == meta
        ));
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let store = FsBlobStore::new(temp_root("traversal"));
        assert!(matches!(
            store.head("../etc/passwd").await,
            Err(BackendError::InvalidKey(_))
        ));
        assert!(matches!(
            store.head("/etc/passwd").await,
            Err(BackendError::InvalidKey(_))
        ));
    }
}
