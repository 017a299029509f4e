use std::io::Read;

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::manifest::HashAlgo;

const READ_BUF: usize = 8192;

/// Running digest for one of the supported algorithms.
pub(crate) enum StreamHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl StreamHasher {
    pub(crate) fn new(algo: HashAlgo) -> Self {
        match algo {
            HashAlgo::Sha1 => Self::Sha1(Sha1::new()),
            HashAlgo::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    pub(crate) fn update(&mut self, bytes: &[u8]) {
        match self {
            Self::Sha1(h) => h.update(bytes),
            Self::Sha256(h) => h.update(bytes),
        }
    }

    /// Lowercase hex of the final digest.
    pub(crate) fn finalize_hex(self) -> String {
        match self {
            Self::Sha1(h) => hex::encode(h.finalize()),
            Self::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

pub fn digest_reader<R: Read>(algo: HashAlgo, mut reader: R) -> std::io::Result<String> {
    let mut hasher = StreamHasher::new(algo);
    let mut buf = [0_u8; READ_BUF];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hasher.finalize_hex())
}

pub fn digest_bytes(algo: HashAlgo, bytes: &[u8]) -> String {
    let mut hasher = StreamHasher::new(algo);
    hasher.update(bytes);
    hasher.finalize_hex()
}

/// Hex digests compare case-insensitively.
pub fn hex_eq(left: &str, right: &str) -> bool {
    left.eq_ignore_ascii_case(right)
}
