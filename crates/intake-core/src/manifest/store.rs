//! Manifest store: transaction id -> registered manifest.
//!
//! Pure lookup/insert. Registration overwrites any previous record for the same id
//! (last write wins) and resets its state to [`TransactionState::Registered`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use super::Manifest;
use crate::store::StoreResult;

/// Lifecycle of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Registered,
    Promoted,
}

/// A stored manifest plus bookkeeping.
#[derive(Debug, Clone)]
pub struct ManifestRecord {
    pub manifest: Arc<Manifest>,
    pub state: TransactionState,
    pub registered_at: DateTime<Utc>,
    /// Distinguishes successive registrations of the same id.
    pub generation: u64,
    /// Object key of the last successful promotion.
    pub promoted_key: Option<String>,
}

#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Store a manifest under its transaction id, replacing any previous record.
    async fn save(&self, manifest: Manifest) -> StoreResult<()>;

    /// Look up the record for a transaction id.
    async fn find(&self, txn_id: &str) -> StoreResult<Option<ManifestRecord>>;

    /// Record a successful promotion of the registration identified by `generation`.
    ///
    /// Returns `false`, leaving the record untouched, when the id is unknown or has been
    /// re-registered since that generation was read.
    async fn mark_promoted(
        &self,
        txn_id: &str,
        generation: u64,
        object_key: &str,
    ) -> StoreResult<bool>;
}

/// Process-local store with an optional retention window.
#[derive(Debug, Default)]
pub struct InMemoryManifestStore {
    records: RwLock<HashMap<String, ManifestRecord>>,
    retention: Option<Duration>,
    generations: AtomicU64,
}

impl InMemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records older than `retention` are treated as absent.
    pub fn with_retention(retention: Duration) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            retention: Some(retention),
            generations: AtomicU64::new(0),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Drop every expired record. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now()).await
    }

    async fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| !self.is_expired(record, now));
        let removed = before - records.len();
        if removed > 0 {
            tracing::debug!(removed, "purged expired manifests");
        }
        removed
    }

    async fn find_at(&self, txn_id: &str, now: DateTime<Utc>) -> Option<ManifestRecord> {
        let records = self.records.read().await;
        records
            .get(txn_id)
            .filter(|record| !self.is_expired(record, now))
            .cloned()
    }

    fn is_expired(&self, record: &ManifestRecord, now: DateTime<Utc>) -> bool {
        match self.retention {
            Some(retention) => record.registered_at + retention < now,
            None => false,
        }
    }
}

#[async_trait]
impl ManifestStore for InMemoryManifestStore {
    async fn save(&self, manifest: Manifest) -> StoreResult<()> {
        let record = ManifestRecord {
            manifest: Arc::new(manifest),
            state: TransactionState::Registered,
            registered_at: Utc::now(),
            generation: self.generations.fetch_add(1, Ordering::Relaxed) + 1,
            promoted_key: None,
        };
        let txn_id = record.manifest.transaction_id.clone();
        if self.records.write().await.insert(txn_id.clone(), record).is_some() {
            tracing::info!(txn_id = %txn_id, "manifest re-registered, previous declaration replaced");
        }
        Ok(())
    }

    async fn find(&self, txn_id: &str) -> StoreResult<Option<ManifestRecord>> {
        Ok(self.find_at(txn_id, Utc::now()).await)
    }

    async fn mark_promoted(
        &self,
        txn_id: &str,
        generation: u64,
        object_key: &str,
    ) -> StoreResult<bool> {
        let mut records = self.records.write().await;
        match records.get_mut(txn_id) {
            Some(record) if record.generation == generation => {
                record.state = TransactionState::Promoted;
                record.promoted_key = Some(object_key.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
