//! The two boundary operations: register a manifest, stream an archive against it.
//!
//! ```text
//! stream(txn, body)
//!   -> exclusive token for txn          (TransactionBusy)
//!   -> manifest lookup                  (UnknownTransaction, AlreadyPromoted)
//!   -> stage + digest, one pass         (Timeout, LimitArchiveBytes)
//!   -> archive hash compare             (IntegrityArchiveHash)
//!   -> structural walk, blocking pool   (Limits / Security / Contract / Integrity)
//!   -> put under deterministic key      (Store, Timeout)
//!   -> mark promoted, release staging
//! ```
//!
//! The staged file and the exclusive token are both dropped on every exit path.

use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;
use tracing::Instrument;

use crate::config::{IntakeConfig, ReplayPolicy};
use crate::error::{UploadError, UploadResult};
use crate::manifest::{InMemoryManifestStore, ManifestRequest, ManifestStore, TransactionState};
use crate::store::{open_store, ArchiveStore, StoreSpec};
use crate::verify::{authenticate, stage_stream, verify_archive_file, VerifyLimits};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// `{ok:true, transactionId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAck {
    pub ok: bool,
    pub transaction_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionStatus {
    #[serde(rename = "PROMOTED")]
    Promoted,
}

/// `{ok:true, status:"PROMOTED", transactionId, objectKey, bucket}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionReceipt {
    pub ok: bool,
    pub status: PromotionStatus,
    pub transaction_id: String,
    pub object_key: String,
    pub bucket: String,
}

/// Transaction ids with a stream call in progress.
#[derive(Debug, Default, Clone)]
struct InFlight {
    active: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    fn acquire(&self, txn_id: &str) -> UploadResult<InFlightGuard> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(txn_id.to_string()) {
            return Err(UploadError::TransactionBusy {
                txn_id: txn_id.to_string(),
            });
        }
        Ok(InFlightGuard {
            active: Arc::clone(&self.active),
            txn_id: txn_id.to_string(),
        })
    }
}

struct InFlightGuard {
    active: Arc<Mutex<HashSet<String>>>,
    txn_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.txn_id);
    }
}

pub struct UploadService {
    manifests: Arc<dyn ManifestStore>,
    store: Arc<dyn ArchiveStore>,
    limits: VerifyLimits,
    replay: ReplayPolicy,
    temp_dir: Option<PathBuf>,
    stream_timeout: Duration,
    promote_timeout: Duration,
    in_flight: InFlight,
}

impl UploadService {
    pub fn new(manifests: Arc<dyn ManifestStore>, store: Arc<dyn ArchiveStore>) -> Self {
        Self {
            manifests,
            store,
            limits: VerifyLimits::default(),
            replay: ReplayPolicy::default(),
            temp_dir: None,
            stream_timeout: DEFAULT_TIMEOUT,
            promote_timeout: DEFAULT_TIMEOUT,
            in_flight: InFlight::default(),
        }
    }

    /// Build a service with an in-memory manifest store and the backend named by
    /// `config.store_url`.
    pub async fn from_config(config: &IntakeConfig) -> UploadResult<Self> {
        let spec = StoreSpec::parse(&config.store_url)?;
        let store = open_store(&spec, &config.bucket).await?;
        let manifests: Arc<dyn ManifestStore> = match config.manifest_ttl_secs {
            Some(ttl) => {
                let ttl = i64::try_from(ttl)
                    .map_err(|_| UploadError::internal(format!("manifest ttl too large: {}", ttl)))?;
                Arc::new(InMemoryManifestStore::with_retention(
                    chrono::Duration::seconds(ttl),
                ))
            }
            None => Arc::new(InMemoryManifestStore::new()),
        };

        tracing::info!(store = %config.store_url, bucket = %config.bucket, "upload service ready");
        Ok(Self::new(manifests, store)
            .with_limits(config.limits())
            .with_replay(config.replay)
            .with_temp_dir(config.temp_dir.clone())
            .with_timeouts(config.stream_timeout(), config.promote_timeout()))
    }

    pub fn with_limits(mut self, limits: VerifyLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_replay(mut self, replay: ReplayPolicy) -> Self {
        self.replay = replay;
        self
    }

    pub fn with_temp_dir(mut self, temp_dir: Option<PathBuf>) -> Self {
        self.temp_dir = temp_dir;
        self
    }

    pub fn with_timeouts(mut self, stream: Duration, promote: Duration) -> Self {
        self.stream_timeout = stream;
        self.promote_timeout = promote;
        self
    }

    pub fn limits(&self) -> &VerifyLimits {
        &self.limits
    }

    pub fn manifests(&self) -> &Arc<dyn ManifestStore> {
        &self.manifests
    }

    /// Validate and store a manifest. Nothing about the archive is checked yet.
    pub async fn register(&self, request: ManifestRequest) -> UploadResult<RegisterAck> {
        let manifest = request.validate_with_limits(&self.limits).map_err(|e| {
            tracing::warn!(reason = %e, "manifest rejected");
            UploadError::from(e)
        })?;
        let txn_id = manifest.transaction_id.clone();
        let files = manifest.files.len();
        self.manifests.save(manifest).await?;

        tracing::info!(txn_id = %txn_id, entries = files, "manifest registered");
        Ok(RegisterAck {
            ok: true,
            transaction_id: txn_id,
        })
    }

    /// Consume `body` once, verify it against the manifest for `txn_id`, and promote it.
    pub async fn stream<R>(&self, txn_id: &str, body: R) -> UploadResult<PromotionReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        let span = tracing::info_span!("stream", txn_id = %txn_id);
        let result = self.stream_inner(txn_id, body).instrument(span).await;
        if let Err(err) = &result {
            tracing::warn!(txn_id = %txn_id, kind = %err.kind(), reason = %err.reason(), "upload rejected");
        }
        result
    }

    async fn stream_inner<R>(&self, txn_id: &str, body: R) -> UploadResult<PromotionReceipt>
    where
        R: AsyncRead + Unpin + Send,
    {
        let _token = self.in_flight.acquire(txn_id)?;

        let record = self
            .manifests
            .find(txn_id)
            .await?
            .ok_or_else(|| UploadError::UnknownTransaction {
                txn_id: txn_id.to_string(),
            })?;
        if record.state == TransactionState::Promoted {
            if self.replay == ReplayPolicy::Reject {
                return Err(UploadError::AlreadyPromoted {
                    txn_id: txn_id.to_string(),
                });
            }
            tracing::info!(
                previous_key = record.promoted_key.as_deref().unwrap_or(""),
                "re-verifying promoted transaction"
            );
        }
        let generation = record.generation;
        let manifest = record.manifest;

        let staged = with_deadline(
            "stream",
            self.stream_timeout,
            stage_stream(
                body,
                manifest.archive_hash_algo,
                self.limits.max_archive_bytes,
                self.temp_dir.as_deref(),
            ),
        )
        .await?;
        authenticate(&staged, &manifest)?;

        let path = staged.path().to_path_buf();
        let limits = self.limits;
        let declared = Arc::clone(&manifest);
        let report =
            tokio::task::spawn_blocking(move || verify_archive_file(&path, &declared, &limits))
                .await
                .map_err(|e| UploadError::internal(format!("verification task failed: {}", e)))??;
        tracing::debug!(
            entries = report.entries,
            bytes = report.decompressed,
            "archive structure verified"
        );

        let key = self.store.object_key(txn_id);
        let receipt = with_deadline(
            "promote",
            self.promote_timeout,
            self.store.put_archive(&key, staged.path()),
        )
        .await?;
        if !self
            .manifests
            .mark_promoted(txn_id, generation, &receipt.key)
            .await?
        {
            tracing::info!(
                object_key = %receipt.key,
                "transaction re-registered during upload, promotion not recorded"
            );
        }

        if let Err(e) = staged.close() {
            tracing::warn!(error = %e, "failed to remove staged archive");
        }
        tracing::info!(
            object_key = %receipt.key,
            bucket = %receipt.bucket,
            bytes = receipt.size,
            entries = report.entries,
            "archive promoted"
        );

        Ok(PromotionReceipt {
            ok: true,
            status: PromotionStatus::Promoted,
            transaction_id: txn_id.to_string(),
            object_key: receipt.key,
            bucket: receipt.bucket,
        })
    }
}

async fn with_deadline<T, E, F>(stage: &'static str, after: Duration, fut: F) -> UploadResult<T>
where
    F: Future<Output = Result<T, E>>,
    UploadError: From<E>,
{
    match tokio::time::timeout(after, fut).await {
        Ok(result) => result.map_err(UploadError::from),
        Err(_) => Err(UploadError::Timeout { stage, after }),
    }
}
