//! Plain HTTP download for URLs that point straight at a media file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::HeaderMap;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::DownloadError;
use crate::hls::events::{DownloadEvent, EventSink, percent_of};

/// How a source URL should be retrieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DownloadMode {
    /// HLS when the URL mentions `.m3u8`, plain HTTP otherwise
    #[default]
    Auto,
    Http,
    Hls,
}

impl DownloadMode {
    /// Turns `Auto` into a concrete mode for `url`.
    pub fn resolve(self, url: &str) -> DownloadMode {
        match self {
            DownloadMode::Auto if url.to_ascii_lowercase().contains(".m3u8") => DownloadMode::Hls,
            DownloadMode::Auto => DownloadMode::Http,
            other => other,
        }
    }
}

impl FromStr for DownloadMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(DownloadMode::Auto),
            "http" => Ok(DownloadMode::Http),
            "hls" => Ok(DownloadMode::Hls),
            _ => Err(format!("Unknown download mode: {s}")),
        }
    }
}

impl fmt::Display for DownloadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DownloadMode::Auto => "auto",
            DownloadMode::Http => "http",
            DownloadMode::Hls => "hls",
        };
        f.write_str(name)
    }
}

/// Copies `stream` into `partial`, reporting progress against `total`.
async fn write_body<S, E>(
    stream: S,
    partial: &Path,
    total: Option<u64>,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<u64, DownloadError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<DownloadError>,
{
    let mut stream = std::pin::pin!(stream);
    let mut writer = BufWriter::new(File::create(partial).await?);
    let mut written: u64 = 0;
    let mut last_percent: Option<u8> = None;

    while let Some(chunk) = stream.next().await {
        if cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }
        let chunk = chunk.map_err(Into::into)?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;

        if let Some(total) = total.filter(|t| *t > 0) {
            let percent = percent_of(written as usize, total as usize);
            if last_percent != Some(percent) {
                last_percent = Some(percent);
                events.emit(DownloadEvent::Progress {
                    completed: written as usize,
                    total: total as usize,
                    percent,
                });
            }
        }
    }
    writer.flush().await?;
    Ok(written)
}

async fn remove_partial(partial: &Path) {
    if let Err(e) = fs::remove_file(partial).await {
        debug!(path = %partial.display(), error = %e, "Could not remove partial download");
    }
}

/// Streams `url` into `output` chunk by chunk.
///
/// `Progress` events are emitted when the server announces a length. The
/// body is written to a `.part` file that is renamed once complete.
pub async fn download_direct(
    client: &Client,
    url: &str,
    output: &Path,
    headers: &HeaderMap,
    events: &EventSink,
    cancel: &CancellationToken,
) -> Result<PathBuf, DownloadError> {
    let parsed = url::Url::parse(url).map_err(|e| DownloadError::UrlError(format!("{url}: {e}")))?;

    info!(url, output = %output.display(), "Starting direct download");
    let response = client.get(parsed).headers(headers.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::StatusCode(status));
    }

    let total = response.content_length();
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).await?;
    }
    let mut partial = output.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    let written = match write_body(
        response.bytes_stream(),
        &partial,
        total,
        events,
        cancel,
    )
    .await
    {
        Ok(written) => written,
        Err(e) => {
            remove_partial(&partial).await;
            return Err(e);
        }
    };

    fs::rename(&partial, output).await?;
    debug!(bytes = written, "Direct download complete");
    events.log(format!("Saved {}", output.display()));
    events.emit(DownloadEvent::Finished {
        path: output.to_path_buf(),
    });
    Ok(output.to_path_buf())
}
