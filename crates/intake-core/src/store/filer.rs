//! SeaweedFS filer backend.
//!
//! The filer exposes buckets as plain paths, so a put is one HTTP `PUT` to
//! `{base}/buckets/{bucket}/{key}` with the staged file streamed as the body.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use tokio_util::io::ReaderStream;
use url::Url;

use super::{ArchiveStore, KeyBuilder, PutReceipt, StoreError, StoreResult, StoreSpec};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Archive store that writes through a SeaweedFS filer.
#[derive(Debug, Clone)]
pub struct FilerArchiveStore {
    client: Client,
    base_url: Url,
    bucket: String,
    keys: KeyBuilder,
}

impl FilerArchiveStore {
    /// Create a filer store rooted at `base_url` (e.g. `http://localhost:8888`).
    pub fn new(base_url: &str, bucket: &str, prefix: &str) -> StoreResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| StoreError::InvalidSpec {
            spec: base_url.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(format!("intake/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url,
            bucket: bucket.to_string(),
            keys: KeyBuilder::new(prefix),
        })
    }

    /// Create from a `filer+http://host:port/prefix` spec.
    pub fn from_spec(spec: &StoreSpec, default_bucket: &str) -> StoreResult<Self> {
        let scheme = spec
            .scheme
            .strip_prefix("filer+")
            .filter(|s| *s == "http" || *s == "https")
            .ok_or_else(|| StoreError::InvalidSpec {
                spec: spec.scheme.clone(),
                reason: "filer scheme must be filer+http or filer+https".to_string(),
            })?;
        let host = spec.host.as_deref().ok_or_else(|| StoreError::InvalidSpec {
            spec: spec.scheme.clone(),
            reason: "filer URL must include a host".to_string(),
        })?;

        let base = match spec.port {
            Some(port) => format!("{}://{}:{}", scheme, host, port),
            None => format!("{}://{}", scheme, host),
        };
        Self::new(&base, default_bucket, &spec.prefix)
    }

    fn object_url(&self, key: &str) -> StoreResult<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| StoreError::InvalidSpec {
                spec: self.base_url.to_string(),
                reason: "base URL cannot carry a path".to_string(),
            })?;
            segments.pop_if_empty().push("buckets").push(&self.bucket);
            segments.extend(key.split('/'));
        }
        Ok(url)
    }
}

#[async_trait]
impl ArchiveStore for FilerArchiveStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn object_key(&self, txn_id: &str) -> String {
        self.keys.archive_key(txn_id)
    }

    async fn put_archive(&self, key: &str, file: &Path) -> StoreResult<PutReceipt> {
        let url = self.object_url(key)?;
        let source = tokio::fs::File::open(file).await?;
        let size = source.metadata().await?.len();

        tracing::debug!(%url, bytes = size, "PUT archive to filer");
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, size)
            .body(Body::wrap_stream(ReaderStream::new(source)))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                key: key.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        Ok(PutReceipt {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            size,
        })
    }
}
