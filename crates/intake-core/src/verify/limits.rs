//! Resource limits and bounded readers for archive verification.

use serde::Deserialize;
use std::io::Read;

/// Resource limits for archive verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyLimits {
    /// Ceiling on non-directory entries.
    pub max_entries: u64,
    /// Ceiling on the running uncompressed total.
    pub max_uncompressed_bytes: u64,
    /// Ceiling on uncompressed/compressed (integer division, compressed floor 1).
    pub max_compression_ratio: u64,
    /// Ceiling on the raw inbound stream.
    pub max_archive_bytes: u64,
    pub max_path_len: usize,
}

impl Default for VerifyLimits {
    fn default() -> Self {
        Self {
            max_entries: 1_000_000,
            max_uncompressed_bytes: 2 * 1024 * 1024 * 1024, // 2 GiB
            max_compression_ratio: 100,
            max_archive_bytes: 2 * 1024 * 1024 * 1024, // 2 GiB
            max_path_len: 4096,
        }
    }
}

/// Partial overrides for `VerifyLimits`. Used for CLI/config parsing.
/// Unknown keys cause deserialization to fail (deny_unknown_fields).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VerifyLimitsOverrides {
    pub max_entries: Option<u64>,
    pub max_uncompressed_bytes: Option<u64>,
    pub max_compression_ratio: Option<u64>,
    pub max_archive_bytes: Option<u64>,
    pub max_path_len: Option<usize>,
}

impl VerifyLimits {
    /// Apply overrides onto these defaults. Only `Some` values override.
    pub fn apply(self, overrides: VerifyLimitsOverrides) -> Self {
        Self {
            max_entries: overrides.max_entries.unwrap_or(self.max_entries),
            max_uncompressed_bytes: overrides
                .max_uncompressed_bytes
                .unwrap_or(self.max_uncompressed_bytes),
            max_compression_ratio: overrides
                .max_compression_ratio
                .unwrap_or(self.max_compression_ratio),
            max_archive_bytes: overrides.max_archive_bytes.unwrap_or(self.max_archive_bytes),
            max_path_len: overrides.max_path_len.unwrap_or(self.max_path_len),
        }
    }
}

/// Which budget a [`LimitReader`] enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LimitTag {
    UncompressedBytes,
    EntrySize,
}

/// Carried inside `std::io::Error` when a [`LimitReader`] overflows.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{tag:?}: exceeded limit of {limit} bytes")]
pub(crate) struct LimitExceeded {
    pub(crate) tag: LimitTag,
    pub(crate) limit: u64,
}

impl LimitExceeded {
    pub(crate) fn from_io(err: &std::io::Error) -> Option<&LimitExceeded> {
        err.get_ref()
            .and_then(|inner| inner.downcast_ref::<LimitExceeded>())
    }
}

/// A reader that limits the total number of bytes read and fails explicitly on overflow.
///
/// Reaching exactly `limit` bytes is fine: the next read probes the inner reader and
/// only fails if it still has data.
pub(crate) struct LimitReader<R> {
    inner: R,
    limit: u64,
    read: u64,
    tag: LimitTag,
}

impl<R: Read> LimitReader<R> {
    pub(crate) fn new(inner: R, limit: u64, tag: LimitTag) -> Self {
        Self {
            inner,
            limit,
            read: 0,
            tag,
        }
    }
}

impl<R: Read> Read for LimitReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.read >= self.limit {
            let mut probe = [0_u8; 1];
            if self.inner.read(&mut probe)? == 0 {
                return Ok(0);
            }
            return Err(std::io::Error::other(LimitExceeded {
                tag: self.tag,
                limit: self.limit,
            }));
        }

        let max_to_read = (self.limit - self.read).min(buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..max_to_read])?;
        self.read += n as u64;

        Ok(n)
    }
}
