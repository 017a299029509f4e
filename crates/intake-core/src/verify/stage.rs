//! Single-pass staging of the inbound stream: every byte is written to a private
//! temporary file and fed to the archive digest in the same loop.

use std::path::Path;

use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufWriter};

use super::digest::StreamHasher;
use super::errors::{ErrorCode, VerifyError};
use crate::manifest::HashAlgo;

const STAGE_BUF: usize = 64 * 1024;

/// The received archive on local disk plus its whole-stream digest.
///
/// The backing file is removed when this value is dropped, whatever the exit path.
#[derive(Debug)]
pub struct StagedArchive {
    file: NamedTempFile,
    digest: String,
    len: u64,
}

impl StagedArchive {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Lowercase hex digest under the manifest's archive algorithm.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Delete the backing file now, surfacing any I/O error.
    pub fn close(self) -> std::io::Result<()> {
        self.file.close()
    }
}

/// Consume `body` to completion exactly once.
pub async fn stage_stream<R>(
    mut body: R,
    algo: HashAlgo,
    max_bytes: u64,
    temp_dir: Option<&Path>,
) -> Result<StagedArchive, VerifyError>
where
    R: AsyncRead + Unpin,
{
    let mut builder = tempfile::Builder::new();
    builder.prefix("upload-").suffix(".zip");
    let staged = match temp_dir {
        Some(dir) => builder.tempfile_in(dir)?,
        None => builder.tempfile()?,
    };

    let handle = tokio::fs::File::from_std(staged.reopen()?);
    let mut out = BufWriter::new(handle);
    let mut hasher = StreamHasher::new(algo);
    let mut buf = vec![0_u8; STAGE_BUF];
    let mut total: u64 = 0;

    loop {
        let n = body.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        total += n as u64;
        if total > max_bytes {
            return Err(VerifyError::limit(
                ErrorCode::LimitArchiveBytes,
                format!("archive exceeds limit of {} bytes", max_bytes),
            ));
        }
        hasher.update(&buf[..n]);
        out.write_all(&buf[..n]).await?;
    }
    out.flush().await?;
    out.into_inner().sync_all().await?;

    let digest = hasher.finalize_hex();
    tracing::debug!(bytes = total, path = %staged.path().display(), "archive staged");

    Ok(StagedArchive {
        file: staged,
        digest,
        len: total,
    })
}
