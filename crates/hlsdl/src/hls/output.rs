// Final assembly: segment concatenation, remux and output placement.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::fs::{self, File};
use tokio::io::{self, AsyncWriteExt, BufWriter};
use tokio::process::Command;
use tracing::{debug, info};

use crate::hls::HlsDownloaderError;

pub struct Assembler;

impl Assembler {
    /// Byte-concatenates `ordered` into `dest`.
    ///
    /// Fails with `AssemblyError` when the number of paths differs from
    /// `expected`, so a partial download never yields a truncated file.
    pub async fn concatenate(
        ordered: &[PathBuf],
        expected: usize,
        dest: &Path,
    ) -> Result<PathBuf, HlsDownloaderError> {
        if ordered.len() != expected {
            return Err(HlsDownloaderError::AssemblyError {
                expected,
                actual: ordered.len(),
            });
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut writer = BufWriter::new(File::create(dest).await?);
        let mut written: u64 = 0;
        for path in ordered {
            let mut reader = File::open(path).await?;
            written += io::copy(&mut reader, &mut writer).await?;
        }
        writer.flush().await?;

        info!(path = %dest.display(), segments = expected, bytes = written, "Segments concatenated");
        Ok(dest.to_path_buf())
    }

    /// Repackages `input` into `output` with a stream copy.
    pub async fn remux(ffmpeg: &Path, input: &Path, output: &Path) -> Result<(), HlsDownloaderError> {
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut cmd = Command::new(ffmpeg);
        cmd.args(["-hide_banner", "-y", "-loglevel", "error", "-i"])
            .arg(input)
            .args(["-c", "copy"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        debug!(command = ?cmd.as_std(), "Running remux");

        let result = cmd.output().await.map_err(|e| {
            HlsDownloaderError::RemuxError(format!("failed to start {}: {e}", ffmpeg.display()))
        })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let stderr = stderr.trim();
            return Err(HlsDownloaderError::RemuxError(if stderr.is_empty() {
                format!("{} exited with {}", ffmpeg.display(), result.status)
            } else {
                format!("{} exited with {}: {stderr}", ffmpeg.display(), result.status)
            }));
        }

        info!(output = %output.display(), "Remux complete");
        Ok(())
    }

    /// Moves a file, copying when a rename cannot cross filesystems.
    pub async fn move_file(from: &Path, to: &Path) -> Result<(), HlsDownloaderError> {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent).await?;
        }
        if fs::rename(from, to).await.is_ok() {
            return Ok(());
        }
        fs::copy(from, to).await?;
        fs::remove_file(from).await?;
        Ok(())
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// `.mp4` when the stream will be remuxed, `.ts` otherwise.
pub fn normalize_output_path(path: &Path, remux: bool) -> PathBuf {
    let ext = if remux { "mp4" } else { "ts" };
    if has_extension(path, ext) {
        path.to_path_buf()
    } else {
        path.with_extension(ext)
    }
}
