//! Archive entry path normalization.
//!
//! Entry names are resolved segment by segment so that nothing can point outside the
//! archive's logical root: absolute names, drive prefixes and any `..` segment are
//! rejected outright, including a bare `..` or a trailing `/..`.

/// Why an entry name was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryPathError {
    #[error("empty entry name")]
    Empty,
    #[error("absolute path not allowed: {0}")]
    Absolute(String),
    #[error("path traversal detected: {0}")]
    Traversal(String),
    #[error("NUL byte in entry name: {0:?}")]
    Nul(String),
    #[error("path length {len} exceeds limit {max}")]
    TooLong { len: usize, max: usize },
}

/// Normalize an archive entry name (or a declared manifest path) to its canonical
/// forward-slash form.
///
/// Backslashes become `/`, empty and `.` segments are dropped.
pub fn normalize_entry_path(name: &str, max_len: usize) -> Result<String, EntryPathError> {
    if name.trim().is_empty() {
        return Err(EntryPathError::Empty);
    }
    if name.len() > max_len {
        return Err(EntryPathError::TooLong {
            len: name.len(),
            max: max_len,
        });
    }
    if name.contains('\0') {
        return Err(EntryPathError::Nul(name.to_string()));
    }

    let unified = name.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(EntryPathError::Absolute(name.to_string()));
    }

    let mut segments = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(EntryPathError::Traversal(name.to_string())),
            other => segments.push(other),
        }
    }

    match segments.first() {
        None => Err(EntryPathError::Empty),
        // `./C:/x` resolves to a drive-rooted path once `.` is dropped
        Some(first) if has_drive_prefix(first) => Err(EntryPathError::Absolute(name.to_string())),
        Some(_) => Ok(segments.join("/")),
    }
}

// `C:` or `C:/...`
fn has_drive_prefix(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
