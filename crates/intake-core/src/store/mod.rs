//! Promotion targets: where verified archives are committed.
//!
//! The pipeline only needs one operation from a backend: put a local file under a
//! deterministic key and report success or failure. Atomicity (no partially written
//! object visible under the key) is delegated to the backend's own put semantics.
//!
//! # Supported specs
//!
//! ```text
//! memory://                         (tests, demos)
//! file:///var/lib/intake            (local directory)
//! s3://my-bucket/incoming?region=.. (S3 and compatibles)
//! filer+http://localhost:8888/pfx   (SeaweedFS filer, PUT /buckets/{bucket}/{key})
//! ```

pub mod error;
pub mod filer;
pub mod naming;
pub mod object_store_backend;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

pub use error::{StoreError, StoreResult};
pub use filer::FilerArchiveStore;
pub use naming::KeyBuilder;
pub use object_store_backend::ObjectStoreArchiveStore;

/// Parsed store specification from CLI/config.
#[derive(Debug, Clone)]
pub struct StoreSpec {
    /// The scheme (memory, file, s3, filer+http, filer+https)
    pub scheme: String,
    /// Bucket for s3, host for filer, empty for file://
    pub host: Option<String>,
    pub port: Option<u16>,
    /// Base prefix/path
    pub prefix: String,
    /// Optional region (for S3)
    pub region: Option<String>,
}

impl StoreSpec {
    /// Parse a store URL like `s3://bucket/prefix` or `file:///path`.
    pub fn parse(url: &str) -> StoreResult<Self> {
        let parsed = url::Url::parse(url).map_err(|e| StoreError::InvalidSpec {
            spec: url.to_string(),
            reason: e.to_string(),
        })?;

        let region = parsed
            .query_pairs()
            .find(|(k, _)| k == "region")
            .map(|(_, v)| v.to_string());

        Ok(Self {
            scheme: parsed.scheme().to_string(),
            host: parsed.host_str().filter(|h| !h.is_empty()).map(|s| s.to_string()),
            port: parsed.port(),
            prefix: parsed.path().trim_matches('/').to_string(),
            region,
        })
    }

    pub fn is_memory(&self) -> bool {
        self.scheme == "memory"
    }

    pub fn is_filer(&self) -> bool {
        self.scheme.starts_with("filer+")
    }
}

/// Outcome of a successful put.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub bucket: String,
    pub key: String,
    pub size: u64,
}

/// The storage collaborator consumed by promotion.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Logical bucket reported back to callers.
    fn bucket(&self) -> &str;

    /// Deterministic object key for a transaction.
    fn object_key(&self, txn_id: &str) -> String;

    /// Upload the file at `file` under `key`. Any error is fatal for the call; no retries.
    async fn put_archive(&self, key: &str, file: &Path) -> StoreResult<PutReceipt>;
}

/// Open the backend named by `spec`. `default_bucket` names the bucket for schemes whose
/// URL does not carry one (everything except `s3://`).
pub async fn open_store(spec: &StoreSpec, default_bucket: &str) -> StoreResult<Arc<dyn ArchiveStore>> {
    if spec.is_filer() {
        return Ok(Arc::new(FilerArchiveStore::from_spec(spec, default_bucket)?));
    }
    Ok(Arc::new(
        ObjectStoreArchiveStore::from_spec(spec, default_bucket).await?,
    ))
}
