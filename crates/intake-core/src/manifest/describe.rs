//! Build the manifest a client would declare for an existing zip.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use zip::ZipArchive;

use super::{DeclaredFile, HashAlgo, Manifest};
use crate::verify::digest::digest_reader;
use crate::verify::errors::{ErrorCode, VerifyError};
use crate::verify::limits::VerifyLimits;
use crate::verify::path::normalize_entry_path;

/// Describe the zip at `path` as a manifest for `txn_id`.
///
/// Entry names go through the same normalizer the verifier uses, so an archive that
/// could never verify (traversal, absolute names, duplicates) is refused here too.
pub fn describe_archive(
    path: &Path,
    txn_id: &str,
    archive_algo: HashAlgo,
    entry_algo: HashAlgo,
    limits: &VerifyLimits,
) -> Result<Manifest, VerifyError> {
    let archive_hash = digest_reader(archive_algo, File::open(path)?)?;
    let mut archive = ZipArchive::new(File::open(path)?)?;

    let mut files = Vec::new();
    let mut seen = HashSet::new();
    for index in 0..archive.len() {
        let entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = normalize_entry_path(entry.name(), limits.max_path_len)?;
        if !seen.insert(name.clone()) {
            return Err(VerifyError::contract(
                ErrorCode::ContractDuplicateEntry,
                format!("duplicate entry: {}", name),
            ));
        }
        let size = entry.size();
        let hash = digest_reader(entry_algo, entry)?;
        files.push(DeclaredFile {
            path: name,
            size,
            hash,
        });
    }

    tracing::debug!(txn_id, entries = files.len(), "archive described");
    Ok(Manifest {
        transaction_id: txn_id.to_string(),
        archive_hash_algo: archive_algo,
        archive_hash,
        entry_hash_algo: entry_algo,
        count: files.len(),
        files,
        created_at: Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
    })
}
