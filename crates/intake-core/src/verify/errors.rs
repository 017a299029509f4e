use serde::Serialize;

use super::limits::{LimitExceeded, LimitTag};
use super::path::EntryPathError;

/// Verification error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorClass {
    /// Integrity violation (archive digest, CRC, entry digest, corrupt container).
    Integrity,
    /// Contract violation (archive content disagrees with the declared manifest).
    Contract,
    /// Security violation (absolute paths, traversal).
    Security,
    /// Resource limit exceeded (decompression-bomb guard).
    Limits,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Stable error codes for verification failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
    IntegrityArchiveHash,
    IntegrityArchive,
    IntegrityEntryRead,
    IntegrityCrc,
    IntegrityEntrySize,
    IntegrityEntryHash,
    IntegrityIo,
    ContractUnexpectedEntry,
    ContractDuplicateEntry,
    ContractMissingEntry,
    ContractCountMismatch,
    ContractInvalidEntryName,
    LimitEntryCount,
    LimitUncompressedBytes,
    LimitCompressionRatio,
    LimitArchiveBytes,
    LimitPathLength,
    SecurityPathTraversal,
    SecurityAbsolutePath,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Typed verification error with stable code.
#[derive(Debug, thiserror::Error)]
#[error("{class}: {message} ({code})")]
pub struct VerifyError {
    pub class: ErrorClass,
    pub code: ErrorCode,
    pub message: String,
    #[source]
    pub source: Option<anyhow::Error>,
}

impl VerifyError {
    pub fn new(class: ErrorClass, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            class,
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.message = format!("{}: {}", context.into(), self.message);
        self
    }

    pub fn class(&self) -> ErrorClass {
        self.class
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub(crate) fn limit(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Limits, code, message)
    }

    pub(crate) fn contract(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Contract, code, message)
    }

    pub(crate) fn integrity(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Integrity, code, message)
    }
}

impl From<std::io::Error> for VerifyError {
    fn from(err: std::io::Error) -> Self {
        if let Some(exceeded) = LimitExceeded::from_io(&err) {
            let code = match exceeded.tag {
                LimitTag::UncompressedBytes => ErrorCode::LimitUncompressedBytes,
                LimitTag::EntrySize => ErrorCode::IntegrityEntrySize,
            };
            let class = match exceeded.tag {
                LimitTag::EntrySize => ErrorClass::Integrity,
                LimitTag::UncompressedBytes => ErrorClass::Limits,
            };
            return Self::new(class, code, exceeded.to_string());
        }
        Self {
            class: ErrorClass::Integrity,
            code: ErrorCode::IntegrityIo,
            message: err.to_string(),
            source: Some(err.into()),
        }
    }
}

impl From<zip::result::ZipError> for VerifyError {
    fn from(err: zip::result::ZipError) -> Self {
        Self {
            class: ErrorClass::Integrity,
            code: ErrorCode::IntegrityArchive,
            message: format!("invalid zip archive: {}", err),
            source: Some(err.into()),
        }
    }
}

impl From<EntryPathError> for VerifyError {
    fn from(err: EntryPathError) -> Self {
        let (class, code) = match &err {
            EntryPathError::Absolute(_) => (ErrorClass::Security, ErrorCode::SecurityAbsolutePath),
            EntryPathError::Traversal(_) => {
                (ErrorClass::Security, ErrorCode::SecurityPathTraversal)
            }
            EntryPathError::TooLong { .. } => (ErrorClass::Limits, ErrorCode::LimitPathLength),
            EntryPathError::Empty | EntryPathError::Nul(_) => {
                (ErrorClass::Contract, ErrorCode::ContractInvalidEntryName)
            }
        };
        Self::new(class, code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_class_message_and_code() {
        let err = VerifyError::contract(ErrorCode::ContractUnexpectedEntry, "unexpected entry: b.txt");
        assert_eq!(
            err.to_string(),
            "Contract: unexpected entry: b.txt (ContractUnexpectedEntry)"
        );
    }

    #[test]
    fn traversal_maps_to_security_class() {
        let err = VerifyError::from(EntryPathError::Traversal("a/../b".into()));
        assert_eq!(err.class(), ErrorClass::Security);
        assert_eq!(err.code(), ErrorCode::SecurityPathTraversal);
    }

    #[test]
    fn plain_io_error_is_integrity_io() {
        let err = VerifyError::from(std::io::Error::other("disk gone"));
        assert_eq!(err.code(), ErrorCode::IntegrityIo);
        assert!(err.source.is_some());
    }
}
