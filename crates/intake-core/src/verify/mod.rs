//! Verification pipeline.
//!
//! 1. [`stage`]: stream to a private temp file while digesting (single pass).
//! 2. Compare the whole-stream digest with the manifest's archive hash.
//! 3. [`archive`]: structural walk of the staged zip with incremental safety bounds,
//!    CRC/size checks and per-entry digests.

pub mod archive;
pub mod digest;
pub mod errors;
pub mod limits;
pub mod path;
pub mod stage;

pub use archive::{verify_archive, verify_archive_file, ArchiveReport};
pub use digest::{digest_bytes, digest_reader, hex_eq};
pub use errors::{ErrorClass, ErrorCode, VerifyError};
pub use limits::{VerifyLimits, VerifyLimitsOverrides};
pub use path::{normalize_entry_path, EntryPathError};
pub use stage::{stage_stream, StagedArchive};

use crate::manifest::Manifest;

/// Compare a staged archive's digest with the declared archive hash.
pub fn authenticate(staged: &StagedArchive, manifest: &Manifest) -> Result<(), VerifyError> {
    if hex_eq(staged.digest(), &manifest.archive_hash) {
        return Ok(());
    }
    Err(VerifyError::integrity(
        ErrorCode::IntegrityArchiveHash,
        format!(
            "archive hash mismatch: expected={}, actual={}",
            manifest.archive_hash,
            staged.digest()
        ),
    ))
}
