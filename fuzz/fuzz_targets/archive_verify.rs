#![no_main]

use std::io::Cursor;

use intake_core::manifest::{DeclaredFile, Manifest};
use intake_core::verify::{verify_archive, VerifyLimits};
use intake_core::HashAlgo;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let manifest = Manifest {
        transaction_id: "fuzz".to_string(),
        archive_hash_algo: HashAlgo::Sha256,
        archive_hash: "0".repeat(64),
        entry_hash_algo: HashAlgo::Sha1,
        count: 1,
        files: vec![DeclaredFile {
            path: "a.txt".to_string(),
            size: 5,
            hash: "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d".to_string(),
        }],
        created_at: None,
    };
    let limits = VerifyLimits {
        max_entries: 64,
        max_uncompressed_bytes: 1024 * 1024,
        ..VerifyLimits::default()
    };
    let _ = verify_archive(Cursor::new(data), &manifest, &limits);
});
