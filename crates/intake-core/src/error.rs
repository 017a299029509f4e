//! Top-level error for the two boundary operations (register, stream).

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::manifest::ManifestError;
use crate::store::StoreError;
use crate::verify::{ErrorClass, ErrorCode, VerifyError};

pub type UploadResult<T> = Result<T, UploadError>;

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid manifest: {0}")]
    InvalidManifest(#[from] ManifestError),

    #[error("unknown txnId: {txn_id}")]
    UnknownTransaction { txn_id: String },

    #[error("transaction busy: another upload for {txn_id} is in progress")]
    TransactionBusy { txn_id: String },

    #[error("transaction already promoted: {txn_id}")]
    AlreadyPromoted { txn_id: String },

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("upload failed: {0}")]
    Store(#[from] StoreError),

    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: &'static str, after: Duration },

    #[error("internal error: {message}")]
    Internal { message: String },
}

/// Coarse failure taxonomy a transport maps to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidManifest,
    UnknownTransaction,
    Authentication,
    SafetyLimit,
    StructuralMismatch,
    Backend,
    Conflict,
    Timeout,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidManifest => "invalid_manifest",
            Self::UnknownTransaction => "unknown_transaction",
            Self::Authentication => "authentication",
            Self::SafetyLimit => "safety_limit",
            Self::StructuralMismatch => "structural_mismatch",
            Self::Backend => "backend",
            Self::Conflict => "conflict",
            Self::Timeout => "timeout",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidManifest(_) => ErrorKind::InvalidManifest,
            Self::UnknownTransaction { .. } => ErrorKind::UnknownTransaction,
            Self::TransactionBusy { .. } | Self::AlreadyPromoted { .. } => ErrorKind::Conflict,
            Self::Verify(err) => verify_kind(err),
            Self::Store(_) => ErrorKind::Backend,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Human-readable reason without the class/code decoration of [`VerifyError`].
    pub fn reason(&self) -> String {
        match self {
            Self::Verify(err) => err.message.clone(),
            other => other.to_string(),
        }
    }

    pub fn to_body(&self) -> FailureBody {
        FailureBody {
            ok: false,
            error: self.reason(),
            kind: self.kind(),
        }
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

fn verify_kind(err: &VerifyError) -> ErrorKind {
    match (err.class(), err.code()) {
        (_, ErrorCode::IntegrityArchiveHash) => ErrorKind::Authentication,
        (_, ErrorCode::IntegrityIo) => ErrorKind::Internal,
        (ErrorClass::Limits | ErrorClass::Security, _) => ErrorKind::SafetyLimit,
        (ErrorClass::Integrity | ErrorClass::Contract, _) => ErrorKind::StructuralMismatch,
    }
}

/// `{ok:false, error, kind}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureBody {
    pub ok: bool,
    pub error: String,
    pub kind: ErrorKind,
}
