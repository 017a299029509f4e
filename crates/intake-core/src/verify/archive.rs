//! Structural verification of a staged zip archive against its manifest.
//!
//! Runs after the whole-stream digest has authenticated the bytes. Entries are walked in
//! central-directory order; every bound is checked incrementally so an early bomb cannot
//! hide behind later, legitimate entries.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use flate2::read::DeflateDecoder;
use zip::{CompressionMethod, ZipArchive};

use super::digest::{digest_reader, hex_eq};
use super::errors::{ErrorCode, VerifyError};
use super::limits::{LimitExceeded, LimitReader, LimitTag, VerifyLimits};
use super::path::normalize_entry_path;
use crate::manifest::{DeclaredFile, Manifest};

const SCAN_BUF: usize = 8192;

/// Totals gathered while verifying an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub entries: u64,
    /// Sum of container-declared uncompressed sizes.
    pub declared_uncompressed: u64,
    /// Sum of container-declared compressed sizes.
    pub declared_compressed: u64,
    /// Bytes actually produced by decompression.
    pub decompressed: u64,
}

impl ArchiveReport {
    fn check_totals(&self, limits: &VerifyLimits) -> Result<(), VerifyError> {
        if self.declared_uncompressed > limits.max_uncompressed_bytes {
            return Err(VerifyError::limit(
                ErrorCode::LimitUncompressedBytes,
                format!(
                    "too large uncompressed total: {}",
                    self.declared_uncompressed
                ),
            ));
        }
        let ratio = self.declared_uncompressed / self.declared_compressed.max(1);
        if ratio > limits.max_compression_ratio {
            return Err(VerifyError::limit(
                ErrorCode::LimitCompressionRatio,
                format!("suspicious compression ratio: {}x", ratio),
            ));
        }
        Ok(())
    }
}

/// Metadata read from the central directory without decompressing.
struct EntryMeta {
    name: String,
    is_dir: bool,
    size: u64,
    compressed_size: u64,
    crc32: u32,
}

fn entry_meta<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
) -> Result<EntryMeta, VerifyError> {
    let entry = archive
        .by_index_raw(index)
        .map_err(|e| VerifyError::from(e).with_context(format!("entry #{}", index)))?;
    Ok(EntryMeta {
        name: entry.name().to_string(),
        is_dir: entry.is_dir(),
        size: entry.size(),
        compressed_size: entry.compressed_size(),
        crc32: entry.crc32(),
    })
}

/// Verify the staged archive at `path`.
pub fn verify_archive_file(
    path: &Path,
    manifest: &Manifest,
    limits: &VerifyLimits,
) -> Result<ArchiveReport, VerifyError> {
    let file = File::open(path)?;
    verify_archive(file, manifest, limits)
}

/// Verify that `reader` holds exactly the entries `manifest` declares.
pub fn verify_archive<R: Read + Seek>(
    reader: R,
    manifest: &Manifest,
    limits: &VerifyLimits,
) -> Result<ArchiveReport, VerifyError> {
    let mut archive = ZipArchive::new(reader)?;

    let mut expected: HashMap<String, &DeclaredFile> = HashMap::with_capacity(manifest.files.len());
    for declared in &manifest.files {
        let path = normalize_entry_path(&declared.path, limits.max_path_len)
            .map_err(|e| VerifyError::from(e).with_context("declared file"))?;
        expected.insert(path, declared);
    }

    let mut seen: HashSet<String> = HashSet::with_capacity(expected.len());
    let mut report = ArchiveReport::default();

    for index in 0..archive.len() {
        let meta = entry_meta(&mut archive, index)?;
        if meta.is_dir {
            continue;
        }

        report.entries += 1;
        if report.entries > limits.max_entries {
            return Err(VerifyError::limit(
                ErrorCode::LimitEntryCount,
                format!("too many entries: {}", report.entries),
            ));
        }

        let path = normalize_entry_path(&meta.name, limits.max_path_len)?;
        let declared = *expected.get(path.as_str()).ok_or_else(|| {
            VerifyError::contract(
                ErrorCode::ContractUnexpectedEntry,
                format!("unexpected entry: {}", path),
            )
        })?;
        if seen.contains(&path) {
            return Err(VerifyError::contract(
                ErrorCode::ContractDuplicateEntry,
                format!("duplicate entry: {}", path),
            ));
        }

        // Sizes come from the container and may be forged; zip64 fields reach u64::MAX.
        report.declared_uncompressed = report
            .declared_uncompressed
            .checked_add(meta.size)
            .ok_or_else(|| {
                VerifyError::limit(
                    ErrorCode::LimitUncompressedBytes,
                    format!("too large uncompressed total: {} overflows", path),
                )
            })?;
        report.declared_compressed = report
            .declared_compressed
            .saturating_add(meta.compressed_size);
        report.check_totals(limits)?;

        let remaining = limits
            .max_uncompressed_bytes
            .saturating_sub(report.decompressed);
        let cap = EntryCap::new(declared.size, remaining);

        let (crc, actual_size) = scan_entry(&mut archive, index, &path, cap)?;
        if crc != meta.crc32 {
            return Err(VerifyError::integrity(
                ErrorCode::IntegrityCrc,
                format!("crc mismatch for {}", path),
            ));
        }
        if actual_size != declared.size {
            return Err(size_mismatch(&path, declared.size, &format!("={}", actual_size)));
        }

        let actual_hash = hash_entry(&mut archive, index, &path, cap, manifest)?;
        if !hex_eq(&actual_hash, &declared.hash) {
            return Err(VerifyError::integrity(
                ErrorCode::IntegrityEntryHash,
                format!("hash mismatch for {}", path),
            ));
        }

        report.decompressed += actual_size;
        seen.insert(path);
    }

    if seen.len() != expected.len() {
        let mut missing: Vec<&str> = expected
            .keys()
            .map(String::as_str)
            .filter(|p| !seen.contains(*p))
            .collect();
        missing.sort_unstable();
        missing.truncate(5);
        return Err(VerifyError::contract(
            ErrorCode::ContractMissingEntry,
            format!(
                "entry count mismatch: expected={} actual={} (missing: {})",
                expected.len(),
                seen.len(),
                missing.join(", ")
            ),
        ));
    }
    if manifest.count != manifest.files.len() {
        return Err(VerifyError::contract(
            ErrorCode::ContractCountMismatch,
            format!(
                "manifest count mismatch: manifest.count={} files.size={}",
                manifest.count,
                manifest.files.len()
            ),
        ));
    }

    Ok(report)
}

/// How many decompressed bytes one entry may yield.
#[derive(Debug, Clone, Copy)]
struct EntryCap {
    limit: u64,
    tag: LimitTag,
}

impl EntryCap {
    fn new(declared_size: u64, remaining_budget: u64) -> Self {
        if declared_size <= remaining_budget {
            Self {
                limit: declared_size,
                tag: LimitTag::EntrySize,
            }
        } else {
            Self {
                limit: remaining_budget,
                tag: LimitTag::UncompressedBytes,
            }
        }
    }
}

/// Entry content, decompressed here rather than by the zip reader so that the CRC
/// comparison below is the only CRC check.
fn open_entry<'a, R: Read + Seek>(
    archive: &'a mut ZipArchive<R>,
    index: usize,
    path: &str,
) -> Result<Box<dyn Read + 'a>, VerifyError> {
    let raw = archive
        .by_index_raw(index)
        .map_err(|e| VerifyError::from(e).with_context(path.to_string()))?;
    if raw.encrypted() {
        return Err(VerifyError::integrity(
            ErrorCode::IntegrityEntryRead,
            format!("encrypted entry not supported: {}", path),
        ));
    }
    match raw.compression() {
        CompressionMethod::Stored => Ok(Box::new(raw)),
        CompressionMethod::Deflated => Ok(Box::new(DeflateDecoder::new(raw))),
        other => Err(VerifyError::integrity(
            ErrorCode::IntegrityEntryRead,
            format!("unsupported compression method for {}: {}", path, other),
        )),
    }
}

/// Decompress once, returning the CRC-32 and byte count.
fn scan_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    path: &str,
    cap: EntryCap,
) -> Result<(u32, u64), VerifyError> {
    let entry = open_entry(archive, index, path)?;
    let mut reader = LimitReader::new(entry, cap.limit, cap.tag);
    let mut crc = crc32fast::Hasher::new();
    let mut buf = [0_u8; SCAN_BUF];
    let mut size: u64 = 0;

    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| entry_read_error(path, cap, e))?;
        if n == 0 {
            break;
        }
        crc.update(&buf[..n]);
        size += n as u64;
    }

    Ok((crc.finalize(), size))
}

/// Decompress a second time for the cryptographic digest.
fn hash_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    path: &str,
    cap: EntryCap,
    manifest: &Manifest,
) -> Result<String, VerifyError> {
    let entry = open_entry(archive, index, path)?;
    let reader = LimitReader::new(entry, cap.limit, cap.tag);
    digest_reader(manifest.entry_hash_algo, reader).map_err(|e| entry_read_error(path, cap, e))
}

// `actual` carries its own relation: "=4" or ">5".
fn size_mismatch(path: &str, expected: u64, actual: &str) -> VerifyError {
    VerifyError::integrity(
        ErrorCode::IntegrityEntrySize,
        format!("size mismatch for {} expected={} actual{}", path, expected, actual),
    )
}

fn entry_read_error(path: &str, cap: EntryCap, err: std::io::Error) -> VerifyError {
    if let Some(exceeded) = LimitExceeded::from_io(&err) {
        return match exceeded.tag {
            LimitTag::EntrySize => size_mismatch(path, cap.limit, &format!(">{}", cap.limit)),
            _ => VerifyError::limit(
                ErrorCode::LimitUncompressedBytes,
                format!("too large uncompressed total: {} exceeds budget", path),
            ),
        };
    }
    VerifyError::integrity(
        ErrorCode::IntegrityEntryRead,
        format!("failed to decompress {}: {}", path, err),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::HashAlgo;
    use crate::verify::digest::digest_bytes;
    use crate::verify::errors::ErrorClass;
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;

    fn zip_of(entries: &[(&str, &[u8])], method: CompressionMethod) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(method);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    fn manifest_for(files: &[(&str, &[u8])]) -> Manifest {
        Manifest {
            transaction_id: "t1".into(),
            archive_hash_algo: HashAlgo::Sha256,
            archive_hash: "0".repeat(64),
            entry_hash_algo: HashAlgo::Sha1,
            count: files.len(),
            files: files
                .iter()
                .map(|(path, content)| DeclaredFile {
                    path: path.to_string(),
                    size: content.len() as u64,
                    hash: digest_bytes(HashAlgo::Sha1, content),
                })
                .collect(),
            created_at: None,
        }
    }

    fn verify(bytes: Vec<u8>, manifest: &Manifest) -> Result<ArchiveReport, VerifyError> {
        verify_archive(Cursor::new(bytes), manifest, &VerifyLimits::default())
    }

    #[test]
    fn matching_archive_passes() {
        let files: &[(&str, &[u8])] = &[("a.txt", b"hello"), ("dir/b.txt", b"world!")];
        let report = verify(zip_of(files, CompressionMethod::Deflated), &manifest_for(files)).unwrap();
        assert_eq!(report.entries, 2);
        assert_eq!(report.decompressed, 11);
    }

    #[test]
    fn directory_entries_are_skipped() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.add_directory("dir/", options).unwrap();
        writer.start_file("dir/a.txt", options).unwrap();
        writer.write_all(b"hello").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let report = verify(bytes, &manifest_for(&[("dir/a.txt", b"hello")])).unwrap();
        assert_eq!(report.entries, 1);
    }

    #[test]
    fn backslash_entry_names_match_forward_slash_declarations() {
        let bytes = zip_of(&[("dir\\a.txt", b"hello")], CompressionMethod::Stored);
        verify(bytes, &manifest_for(&[("dir/a.txt", b"hello")])).unwrap();
    }

    #[test]
    fn content_hash_mismatch_names_the_path() {
        let bytes = zip_of(&[("a.txt", b"world")], CompressionMethod::Deflated);
        let err = verify(bytes, &manifest_for(&[("a.txt", b"hello")])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IntegrityEntryHash);
        assert!(err.message.contains("hash mismatch for a.txt"));
    }

    #[test]
    fn size_mismatch_names_the_path() {
        let bytes = zip_of(&[("a.txt", b"hello!")], CompressionMethod::Deflated);
        let err = verify(bytes, &manifest_for(&[("a.txt", b"hello")])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IntegrityEntrySize);
        assert!(err.message.contains("size mismatch for a.txt"), "{}", err);

        let bytes = zip_of(&[("a.txt", b"hell")], CompressionMethod::Stored);
        let err = verify(bytes, &manifest_for(&[("a.txt", b"hello")])).unwrap_err();
        assert_eq!(err.message, "size mismatch for a.txt expected=5 actual=4");
    }

    #[test]
    fn undeclared_entry_is_rejected() {
        let bytes = zip_of(
            &[("a.txt", b"hello"), ("b.txt", b"extra")],
            CompressionMethod::Stored,
        );
        let err = verify(bytes, &manifest_for(&[("a.txt", b"hello")])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ContractUnexpectedEntry);
        assert_eq!(err.message, "unexpected entry: b.txt");
    }

    #[test]
    fn omitted_entry_is_rejected() {
        let bytes = zip_of(&[("a.txt", b"hello")], CompressionMethod::Stored);
        let manifest = manifest_for(&[("a.txt", b"hello"), ("b.txt", b"extra")]);
        let err = verify(bytes, &manifest).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ContractMissingEntry);
        assert!(err.message.contains("expected=2 actual=1"));
        assert!(err.message.contains("b.txt"));
    }

    #[test]
    fn tampered_manifest_count_is_caught() {
        let files: &[(&str, &[u8])] = &[("a.txt", b"hello")];
        let mut manifest = manifest_for(files);
        manifest.count = 7;
        let err = verify(zip_of(files, CompressionMethod::Stored), &manifest).unwrap_err();
        assert_eq!(err.code(), ErrorCode::ContractCountMismatch);
    }

    #[test]
    fn traversal_entry_is_a_security_failure() {
        let bytes = zip_of(&[("../evil.sh", b"rm -rf /")], CompressionMethod::Stored);
        let err = verify(bytes, &manifest_for(&[("a.txt", b"hello")])).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Security);
        assert_eq!(err.code(), ErrorCode::SecurityPathTraversal);
    }

    #[test]
    fn garbage_is_not_an_archive() {
        let err = verify(b"definitely not a zip".to_vec(), &manifest_for(&[])).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IntegrityArchive);
    }

    fn le16(bytes: &[u8], at: usize) -> usize {
        usize::from(u16::from_le_bytes([bytes[at], bytes[at + 1]]))
    }

    /// Offset of the central directory record for `name`.
    fn central_record(bytes: &[u8], name: &str) -> usize {
        (0..bytes.len().saturating_sub(46))
            .find(|&at| {
                bytes[at..at + 4] == [0x50, 0x4b, 0x01, 0x02]
                    && bytes[at + 46..].starts_with(name.as_bytes())
                    && le16(bytes, at + 28) == name.len()
            })
            .unwrap_or_else(|| panic!("no central directory record for {name}"))
    }

    /// Rewrite the zip64 uncompressed size of `name` in the central directory.
    fn patch_zip64_size(bytes: &mut [u8], name: &str, size: u64) {
        let at = central_record(bytes, name);
        let extra = at + 46 + name.len();
        let end = extra + le16(bytes, at + 30);
        let mut pos = extra;
        while pos + 4 <= end {
            if le16(bytes, pos) == 0x0001 {
                bytes[pos + 4..pos + 12].copy_from_slice(&size.to_le_bytes());
                return;
            }
            pos += 4 + le16(bytes, pos + 2);
        }
        panic!("no zip64 field for {name}");
    }

    fn zip64_of(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Stored)
            .large_file(true);
        for (name, content) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn forged_zip64_size_trips_the_uncompressed_ceiling() {
        let files: &[(&str, &[u8])] = &[("a.txt", b"hello"), ("b.txt", b"world")];
        let mut bytes = zip64_of(files);
        patch_zip64_size(&mut bytes, "b.txt", 3 * 1024 * 1024 * 1024);

        let err = verify(bytes, &manifest_for(files)).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Limits);
        assert_eq!(err.code(), ErrorCode::LimitUncompressedBytes);
        assert_eq!(err.message, "too large uncompressed total: 3221225477");
    }

    #[test]
    fn forged_zip64_size_cannot_wrap_the_running_total() {
        let files: &[(&str, &[u8])] = &[("a.txt", b"hello"), ("b.txt", b"world")];
        let mut bytes = zip64_of(files);
        patch_zip64_size(&mut bytes, "b.txt", u64::MAX - 2);
        let limits = VerifyLimits {
            max_uncompressed_bytes: u64::MAX,
            max_compression_ratio: u64::MAX,
            ..VerifyLimits::default()
        };

        let err = verify_archive(Cursor::new(bytes), &manifest_for(files), &limits).unwrap_err();
        assert_eq!(err.code(), ErrorCode::LimitUncompressedBytes);
        assert!(err.message.contains("b.txt overflows"), "{}", err);
    }

    #[test]
    fn recorded_crc_is_checked_independently_of_the_zip_reader() {
        let files: &[(&str, &[u8])] = &[("a.txt", b"hello hello hello")];
        let mut bytes = zip_of(files, CompressionMethod::Deflated);
        let at = central_record(&bytes, "a.txt");
        bytes[at + 16] ^= 0xff;

        let err = verify(bytes, &manifest_for(files)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IntegrityCrc);
        assert_eq!(err.message, "crc mismatch for a.txt");
    }

    #[test]
    fn corrupt_deflate_stream_is_an_entry_read_failure() {
        let content = b"hello hello hello hello";
        let files: &[(&str, &[u8])] = &[("a.txt", content)];
        let mut bytes = zip_of(files, CompressionMethod::Deflated);
        // First byte after the local header carries the block type; 0b11 is reserved.
        let data = 30 + "a.txt".len() + le16(&bytes, 28);
        bytes[data] |= 0b110;

        let err = verify(bytes, &manifest_for(files)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IntegrityEntryRead);
        assert!(err.message.starts_with("failed to decompress a.txt"), "{}", err);
    }

    #[test]
    fn entry_cap_prefers_the_tighter_budget() {
        let cap = EntryCap::new(10, 100);
        assert_eq!((cap.limit, cap.tag), (10, LimitTag::EntrySize));
        let cap = EntryCap::new(100, 10);
        assert_eq!((cap.limit, cap.tag), (10, LimitTag::UncompressedBytes));
    }
}
