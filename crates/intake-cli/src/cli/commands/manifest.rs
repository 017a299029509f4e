//! `intake manifest` - describe a zip as a registrable manifest.

use anyhow::{Context, Result};
use intake_core::manifest::describe_archive;
use intake_core::{UploadError, VerifyLimits};

use super::super::args::ManifestArgs;
use crate::exit_codes;

pub fn run(args: ManifestArgs) -> Result<i32> {
    if !args.archive.is_file() {
        anyhow::bail!("archive not found: {}", args.archive.display());
    }

    let manifest = match describe_archive(
        &args.archive,
        &args.txn_id,
        args.archive_algo,
        args.entry_algo,
        &VerifyLimits::default(),
    ) {
        Ok(manifest) => manifest,
        Err(e) => return super::report_failure(&UploadError::from(e)),
    };

    match &args.out {
        Some(out) => {
            let json = serde_json::to_string_pretty(&manifest)?;
            std::fs::write(out, json)
                .with_context(|| format!("failed to write manifest: {}", out.display()))?;
            tracing::info!(txn_id = %manifest.transaction_id, entries = manifest.count, out = %out.display(), "manifest written");
        }
        None => super::print_json(&manifest)?,
    }
    Ok(exit_codes::SUCCESS)
}
