//! `intake check` - registration-time validation only.

use anyhow::Result;
use intake_core::{RegisterAck, UploadError};

use super::super::args::CheckArgs;
use crate::exit_codes;

pub fn run(args: CheckArgs) -> Result<i32> {
    let request = match super::read_manifest(&args.manifest)? {
        Ok(request) => request,
        Err(e) => return super::report_failure(&e),
    };

    match request.validate() {
        Ok(manifest) => {
            super::print_json(&RegisterAck {
                ok: true,
                transaction_id: manifest.transaction_id,
            })?;
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => super::report_failure(&UploadError::from(e)),
    }
}
