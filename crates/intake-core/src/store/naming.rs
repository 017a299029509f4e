//! Key naming for promoted archives.
//!
//! ```text
//! {base_prefix}/{txn_id}.zip
//! ```
//!
//! The key is a pure function of the transaction id, so a replayed upload lands on the
//! same object.

/// Builder for storage keys.
#[derive(Debug, Clone, Default)]
pub struct KeyBuilder {
    /// Base prefix (e.g., "incoming/2026")
    base_prefix: String,
}

impl KeyBuilder {
    /// Create a new key builder with the given base prefix.
    pub fn new(base_prefix: impl Into<String>) -> Self {
        let prefix = base_prefix.into();
        Self {
            base_prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.base_prefix
    }

    /// Key for a promoted archive.
    ///
    /// Returns: `{base}/{txn_id}.zip`
    pub fn archive_key(&self, txn_id: &str) -> String {
        let sanitized = Self::sanitize_id(txn_id);
        if self.base_prefix.is_empty() {
            format!("{}.zip", sanitized)
        } else {
            format!("{}/{}.zip", self.base_prefix, sanitized)
        }
    }

    /// Transaction ids are opaque. Bytes outside `[A-Za-z0-9._:-]` are written as `%XX`
    /// (including `%` itself), so an id can never introduce a path segment and two
    /// distinct ids never share a key.
    fn sanitize_id(id: &str) -> String {
        let mut out = String::with_capacity(id.len());
        for byte in id.bytes() {
            if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'_' | b':' | b'.') {
                out.push(char::from(byte));
            } else {
                out.push('%');
                out.push(char::from(HEX_UPPER[usize::from(byte >> 4)]));
                out.push(char::from(HEX_UPPER[usize::from(byte & 0x0f)]));
            }
        }
        out
    }
}

const HEX_UPPER: &[u8; 16] = b"0123456789ABCDEF";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_key_no_prefix() {
        let kb = KeyBuilder::new("");
        assert_eq!(kb.archive_key("t1"), "t1.zip");
    }

    #[test]
    fn test_archive_key_with_prefix() {
        let kb = KeyBuilder::new("/incoming/");
        assert_eq!(kb.archive_key("t1"), "incoming/t1.zip");
    }

    #[test]
    fn test_archive_key_is_sanitized() {
        let kb = KeyBuilder::new("");
        assert_eq!(kb.archive_key("../a/b c"), "..%2Fa%2Fb%20c.zip");
        assert_eq!(kb.archive_key("inv_1:v2"), "inv_1:v2.zip");
        assert_eq!(kb.archive_key("caf\u{e9}"), "caf%C3%A9.zip");
    }

    #[test]
    fn test_distinct_ids_never_share_a_key() {
        let kb = KeyBuilder::new("incoming");
        let ids = ["inv 1", "inv/1", "inv_1", "inv%201", "inv%2F1", "inv\\1"];
        let keys: std::collections::HashSet<String> =
            ids.iter().map(|id| kb.archive_key(id)).collect();
        assert_eq!(keys.len(), ids.len());
        assert!(keys.iter().all(|k| k.matches('/').count() == 1));
    }
}
