//! `intake push` - register a manifest, then stream its archive through the pipeline.

use anyhow::{Context, Result};
use intake_core::{IntakeConfig, UploadService};

use super::super::args::PushArgs;
use crate::exit_codes;

pub async fn run(args: PushArgs) -> Result<i32> {
    // 1. Configuration: file, then INTAKE_* environment, then flags
    let config = match &args.config {
        Some(path) => IntakeConfig::load(path)?,
        None => IntakeConfig::default(),
    };
    let mut config = config
        .with_env()
        .context("invalid INTAKE_* environment")?;
    if let Some(store) = args.store {
        config.store_url = store;
    }
    if let Some(bucket) = args.bucket {
        config.bucket = bucket;
    }

    let service = UploadService::from_config(&config)
        .await
        .with_context(|| format!("failed to open store: {}", config.store_url))?;

    // 2. Register
    let request = match super::read_manifest(&args.manifest)? {
        Ok(request) => request,
        Err(e) => return super::report_failure(&e),
    };
    let ack = match service.register(request).await {
        Ok(ack) => ack,
        Err(e) => return super::report_failure(&e),
    };

    // 3. Stream
    let archive = tokio::fs::File::open(&args.archive)
        .await
        .with_context(|| format!("failed to open archive: {}", args.archive.display()))?;
    match service.stream(&ack.transaction_id, archive).await {
        Ok(receipt) => {
            super::print_json(&receipt)?;
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => super::report_failure(&e),
    }
}
