//! Object store implementation of ArchiveStore.
//!
//! Supports S3, local filesystem and in-memory via the `object_store` crate.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use object_store::buffered::BufWriter;
use object_store::{ObjectStore, ObjectStoreExt};
use tokio::io::AsyncWriteExt;

use super::{ArchiveStore, KeyBuilder, PutReceipt, StoreError, StoreResult, StoreSpec};

/// Files up to this size go up in a single put; larger ones use multipart.
const DEFAULT_PART_SIZE: usize = 16 * 1024 * 1024;

/// Archive store backed by `object_store`.
pub struct ObjectStoreArchiveStore {
    inner: Arc<dyn ObjectStore>,
    keys: KeyBuilder,
    bucket: String,
    part_size: usize,
}

impl ObjectStoreArchiveStore {
    /// Create a store from a parsed spec.
    pub async fn from_spec(spec: &StoreSpec, default_bucket: &str) -> StoreResult<Self> {
        let (inner, bucket, prefix): (Arc<dyn ObjectStore>, String, String) =
            match spec.scheme.as_str() {
                "memory" => (
                    Arc::new(object_store::memory::InMemory::new()),
                    default_bucket.to_string(),
                    spec.prefix.clone(),
                ),
                "file" => {
                    let root = match &spec.host {
                        Some(host) => format!("/{}/{}", host, spec.prefix),
                        None if spec.prefix.is_empty() => "/tmp/intake-store".to_string(),
                        None => format!("/{}", spec.prefix),
                    };
                    let root = format!("{}/{}", root.trim_end_matches('/'), default_bucket);
                    tokio::fs::create_dir_all(&root).await.map_err(|e| StoreError::Io {
                        message: format!("failed to create store directory {}: {}", root, e),
                    })?;
                    let local = object_store::local::LocalFileSystem::new_with_prefix(&root)
                        .map_err(|e| StoreError::Io {
                            message: format!("failed to create local store at {}: {}", root, e),
                        })?;
                    (Arc::new(local), default_bucket.to_string(), String::new())
                }
                "s3" => {
                    let bucket = spec.host.as_ref().ok_or_else(|| StoreError::InvalidSpec {
                        spec: format!("s3:///{}", spec.prefix),
                        reason: "S3 URL must include bucket name".to_string(),
                    })?;

                    let mut builder = object_store::aws::AmazonS3Builder::from_env()
                        .with_bucket_name(bucket)
                        .with_allow_http(false);
                    if let Some(region) = &spec.region {
                        builder = builder.with_region(region);
                    }
                    let s3 = builder.build().map_err(|e| StoreError::Io {
                        message: format!("failed to create S3 client: {}", e),
                    })?;
                    (Arc::new(s3), bucket.clone(), spec.prefix.clone())
                }
                scheme => {
                    return Err(StoreError::InvalidSpec {
                        spec: spec.scheme.clone(),
                        reason: format!("unsupported scheme: {}", scheme),
                    })
                }
            };

        Ok(Self {
            inner,
            keys: KeyBuilder::new(prefix),
            bucket,
            part_size: DEFAULT_PART_SIZE,
        })
    }

    /// Create an in-memory store for testing.
    pub fn memory(bucket: &str) -> Self {
        Self {
            inner: Arc::new(object_store::memory::InMemory::new()),
            keys: KeyBuilder::new(""),
            bucket: bucket.to_string(),
            part_size: DEFAULT_PART_SIZE,
        }
    }

    /// Switch to multipart above `part_size` bytes.
    pub fn with_part_size(mut self, part_size: usize) -> Self {
        self.part_size = part_size;
        self
    }

    /// Download a promoted archive.
    pub async fn read_archive(&self, key: &str) -> StoreResult<Bytes> {
        let location = object_key_path(key)?;
        let result = self
            .inner
            .get(&location)
            .await
            .map_err(|e| StoreError::from_object_store(e, key))?;

        result.bytes().await.map_err(|e| StoreError::Io {
            message: format!("failed to read archive bytes: {}", e),
        })
    }
}

// Keys are already escaped by `KeyBuilder`; parse keeps them verbatim instead of
// encoding `%` a second time.
fn object_key_path(key: &str) -> StoreResult<object_store::path::Path> {
    object_store::path::Path::parse(key)
        .map_err(|e| StoreError::from_object_store(e.into(), key))
}

#[async_trait]
impl ArchiveStore for ObjectStoreArchiveStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_key(&self, txn_id: &str) -> String {
        self.keys.archive_key(txn_id)
    }

    async fn put_archive(&self, key: &str, file: &Path) -> StoreResult<PutReceipt> {
        let location = object_key_path(key)?;
        let mut source = tokio::fs::File::open(file).await?;
        let size = source.metadata().await?.len();

        let mut writer = BufWriter::with_capacity(Arc::clone(&self.inner), location, self.part_size);
        let copied = match tokio::io::copy(&mut source, &mut writer).await {
            Ok(_) => writer.shutdown().await,
            Err(e) => Err(e),
        };
        if let Err(e) = copied {
            if let Err(abort_err) = writer.abort().await {
                tracing::warn!(key, error = %abort_err, "failed to abort partial upload");
            }
            return Err(StoreError::Io {
                message: format!("failed to put object {}: {}", key, e),
            });
        }

        tracing::debug!(key, bytes = size, "archive stored");
        Ok(PutReceipt {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            size,
        })
    }
}
