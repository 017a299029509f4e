//! Upload manifests: the client's up-front declaration of an archive.
//!
//! A manifest arrives on the wire as a [`ManifestRequest`] (every field optional so that
//! missing fields can be reported by name) and becomes a [`Manifest`] only through
//! [`ManifestRequest::validate`]. Everything downstream works on the validated form.

pub mod describe;
pub mod store;
pub mod validate;

use serde::{Deserialize, Serialize};

pub use describe::describe_archive;
pub use store::{InMemoryManifestStore, ManifestRecord, ManifestStore, TransactionState};
pub use validate::ManifestError;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgo {
    #[serde(rename = "SHA-1")]
    Sha1,
    #[serde(rename = "SHA-256")]
    Sha256,
}

impl HashAlgo {
    /// Parse an algorithm identifier (`SHA-1`, `SHA1`, `SHA-256`, `SHA256`, any case).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SHA-1" | "SHA1" => Some(Self::Sha1),
            "SHA-256" | "SHA256" => Some(Self::Sha256),
            _ => None,
        }
    }

    /// Length of the hex-encoded digest.
    pub fn hex_len(self) -> usize {
        match self {
            Self::Sha1 => 40,
            Self::Sha256 => 64,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
        }
    }
}

impl std::fmt::Display for HashAlgo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HashAlgo {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ManifestError::new(format!("unsupported hash algo: {}", s)))
    }
}

/// A validated manifest. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub transaction_id: String,
    pub archive_hash_algo: HashAlgo,
    /// Lowercase hex digest of the whole raw archive stream.
    pub archive_hash: String,
    pub entry_hash_algo: HashAlgo,
    pub count: usize,
    pub files: Vec<DeclaredFile>,
    /// Informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// One declared archive entry. `path` is stored normalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeclaredFile {
    pub path: String,
    pub size: u64,
    /// Lowercase hex digest of the decompressed content.
    pub hash: String,
}

/// Manifest as received at the system boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRequest {
    #[serde(alias = "txnId")]
    pub transaction_id: Option<String>,
    pub archive_hash_algo: Option<String>,
    pub archive_hash: Option<String>,
    pub entry_hash_algo: Option<String>,
    #[serde(default)]
    pub count: i64,
    pub files: Option<Vec<DeclaredFileRequest>>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredFileRequest {
    pub path: Option<String>,
    #[serde(default)]
    pub size: i64,
    pub hash: Option<String>,
}

impl From<&Manifest> for ManifestRequest {
    fn from(manifest: &Manifest) -> Self {
        Self {
            transaction_id: Some(manifest.transaction_id.clone()),
            archive_hash_algo: Some(manifest.archive_hash_algo.to_string()),
            archive_hash: Some(manifest.archive_hash.clone()),
            entry_hash_algo: Some(manifest.entry_hash_algo.to_string()),
            count: manifest.count as i64,
            files: Some(
                manifest
                    .files
                    .iter()
                    .map(|f| DeclaredFileRequest {
                        path: Some(f.path.clone()),
                        size: f.size as i64,
                        hash: Some(f.hash.clone()),
                    })
                    .collect(),
            ),
            created_at: manifest.created_at.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algo_parse_accepts_aliases_in_any_case() {
        assert_eq!(HashAlgo::parse("sha-256"), Some(HashAlgo::Sha256));
        assert_eq!(HashAlgo::parse(" SHA256 "), Some(HashAlgo::Sha256));
        assert_eq!(HashAlgo::parse("Sha1"), Some(HashAlgo::Sha1));
        assert_eq!(HashAlgo::parse("MD5"), None);
    }

    #[test]
    fn algo_hex_lengths() {
        assert_eq!(HashAlgo::Sha1.hex_len(), 40);
        assert_eq!(HashAlgo::Sha256.hex_len(), 64);
    }

    #[test]
    fn request_accepts_txn_id_alias() {
        let req: ManifestRequest = serde_json::from_str(
            r#"{"txnId":"t1","archiveHashAlgo":"SHA-256","count":0,"files":[]}"#,
        )
        .unwrap();
        assert_eq!(req.transaction_id.as_deref(), Some("t1"));
        assert_eq!(req.archive_hash_algo.as_deref(), Some("SHA-256"));
    }

    #[test]
    fn manifest_serializes_in_wire_shape() {
        let manifest = Manifest {
            transaction_id: "t1".into(),
            archive_hash_algo: HashAlgo::Sha256,
            archive_hash: "ab".repeat(32),
            entry_hash_algo: HashAlgo::Sha1,
            count: 0,
            files: vec![],
            created_at: None,
        };
        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["transactionId"], "t1");
        assert_eq!(json["archiveHashAlgo"], "SHA-256");
        assert_eq!(json["entryHashAlgo"], "SHA-1");
        assert!(json.get("createdAt").is_none());

        let back: ManifestRequest = serde_json::from_value(json).unwrap();
        assert_eq!(back, ManifestRequest::from(&manifest));
    }
}
