//! Registration-time validation: internal consistency only, no archive is touched.

use std::collections::HashSet;

use super::{DeclaredFile, DeclaredFileRequest, HashAlgo, Manifest, ManifestRequest};
use crate::verify::limits::VerifyLimits;
use crate::verify::path::normalize_entry_path;

/// A manifest failed validation and was not persisted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ManifestError {
    pub message: String,
}

impl ManifestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

type ValidateResult<T> = Result<T, ManifestError>;

impl ManifestRequest {
    /// Validate against default limits.
    pub fn validate(self) -> ValidateResult<Manifest> {
        self.validate_with_limits(&VerifyLimits::default())
    }

    pub fn validate_with_limits(self, limits: &VerifyLimits) -> ValidateResult<Manifest> {
        let transaction_id = require_non_blank("transactionId", self.transaction_id)?;
        let archive_algo = require_non_blank("archiveHashAlgo", self.archive_hash_algo)?;
        let archive_hash = require_non_blank("archiveHash", self.archive_hash)?;
        let entry_algo = require_non_blank("entryHashAlgo", self.entry_hash_algo)?;

        let archive_hash_algo: HashAlgo = archive_algo.parse()?;
        let entry_hash_algo: HashAlgo = entry_algo.parse()?;
        let archive_hash = require_hex("archiveHash", &archive_hash, archive_hash_algo)?;

        let files = self
            .files
            .ok_or_else(|| ManifestError::new("files required"))?;
        if self.count < 0 || self.count as u64 != files.len() as u64 {
            return Err(ManifestError::new(format!(
                "count != files.size(): count={} files={}",
                self.count,
                files.len()
            )));
        }

        let mut seen = HashSet::with_capacity(files.len());
        let mut declared = Vec::with_capacity(files.len());
        for file in files {
            let file = validate_file(file, entry_hash_algo, limits)?;
            if !seen.insert(file.path.clone()) {
                return Err(ManifestError::new(format!("duplicate path: {}", file.path)));
            }
            declared.push(file);
        }

        Ok(Manifest {
            transaction_id,
            archive_hash_algo,
            archive_hash,
            entry_hash_algo,
            count: declared.len(),
            files: declared,
            created_at: self.created_at,
        })
    }
}

fn validate_file(
    file: DeclaredFileRequest,
    algo: HashAlgo,
    limits: &VerifyLimits,
) -> ValidateResult<DeclaredFile> {
    let raw_path = require_non_blank("files.path", file.path)?;
    let path = normalize_entry_path(&raw_path, limits.max_path_len)
        .map_err(|e| ManifestError::new(format!("files.path: {}", e)))?;
    if file.size < 0 {
        return Err(ManifestError::new(format!(
            "files.size must be >= 0 for {}",
            raw_path
        )));
    }
    let hash = file
        .hash
        .ok_or_else(|| ManifestError::new(format!("files.hash({}) required", raw_path)))?;
    let hash = require_hex(&format!("files.hash({})", raw_path), &hash, algo)?;

    Ok(DeclaredFile {
        path,
        size: file.size as u64,
        hash,
    })
}

fn require_non_blank(field: &str, value: Option<String>) -> ValidateResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ManifestError::new(format!("{} required", field))),
    }
}

fn require_hex(field: &str, hex: &str, algo: HashAlgo) -> ValidateResult<String> {
    let lower = hex.to_ascii_lowercase();
    if lower.len() != algo.hex_len() {
        return Err(ManifestError::new(format!(
            "{} length != {}",
            field,
            algo.hex_len()
        )));
    }
    if !lower.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ManifestError::new(format!("{} not hex", field)));
    }
    Ok(lower)
}
