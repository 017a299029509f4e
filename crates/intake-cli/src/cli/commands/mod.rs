mod check;
mod dispatch;
mod manifest;
mod push;

pub use dispatch::dispatch;

use anyhow::{Context, Result};
use intake_core::{ManifestError, ManifestRequest, UploadError};
use serde::Serialize;
use std::path::Path;

/// Read a manifest file. Syntax errors are a rejected manifest, not a fatal error.
pub(crate) fn read_manifest(path: &Path) -> Result<Result<ManifestRequest, UploadError>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    Ok(serde_json::from_str(&raw)
        .map_err(|e| UploadError::from(ManifestError::new(format!("malformed manifest: {}", e)))))
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the failure body and return the matching exit code.
pub(crate) fn report_failure(err: &UploadError) -> Result<i32> {
    print_json(&err.to_body())?;
    Ok(crate::exit_codes::for_kind(err.kind()))
}
