#![no_main]

use intake_core::verify::normalize_entry_path;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(name) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(normalized) = normalize_entry_path(name, 4096) {
        assert!(!normalized.starts_with('/'));
        assert!(!normalized.contains('\\'));
        assert!(normalized.split('/').all(|s| !s.is_empty() && s != "." && s != ".."));
        // Normalization is idempotent.
        assert_eq!(normalize_entry_path(&normalized, 4096).as_deref(), Ok(normalized.as_str()));
    }
});
