//! Exit codes for `intake`. Part of the public contract for scripts and CI.

use intake_core::ErrorKind;

pub const SUCCESS: i32 = 0;
pub const REJECTED: i32 = 1; // Manifest or upload refused (validation, integrity, limits, backend)
pub const INTERNAL_ERROR: i32 = 2; // Bad configuration, unreadable input, internal failure

pub fn for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Internal => INTERNAL_ERROR,
        _ => REJECTED,
    }
}
