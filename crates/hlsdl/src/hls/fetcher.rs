// HLS Segment Fetcher: downloads one segment, decrypts it and stores it on disk.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use tokio::fs;
use tracing::debug;

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsConfig;
use crate::hls::decryption::DecryptionService;
use crate::hls::http::{HttpTransport, RequestKind};
use crate::hls::playlist::{KeyMethod, Segment};

#[async_trait]
pub trait SegmentDownloader: Send + Sync {
    /// Stores the clear payload of `segment` at `dest` and returns the path.
    async fn fetch_segment(
        &self,
        segment: &Segment,
        dest: &Path,
    ) -> Result<PathBuf, HlsDownloaderError>;
}

pub struct SegmentFetcher {
    transport: Arc<dyn HttpTransport>,
    decryption: DecryptionService,
    headers: HeaderMap,
}

impl SegmentFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &HlsConfig, headers: HeaderMap) -> Self {
        let decryption = DecryptionService::new(transport.clone(), &config.decryption_config);
        Self {
            transport,
            decryption,
            headers,
        }
    }
}

async fn is_complete(path: &Path) -> bool {
    fs::metadata(path)
        .await
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

#[async_trait]
impl SegmentDownloader for SegmentFetcher {
    async fn fetch_segment(
        &self,
        segment: &Segment,
        dest: &Path,
    ) -> Result<PathBuf, HlsDownloaderError> {
        if is_complete(dest).await {
            debug!(msn = segment.sequence, path = %dest.display(), "Segment already on disk, skipping");
            return Ok(dest.to_path_buf());
        }

        // Refuse unknown encryption before spending bandwidth on it
        if let KeyMethod::Other(method) = &segment.key.method {
            return Err(HlsDownloaderError::DrmUnsupported(method.clone()));
        }

        let raw = self
            .transport
            .get(&segment.uri, &self.headers, RequestKind::Segment)
            .await
            .map_err(|e| match e {
                HlsDownloaderError::Cancelled => e,
                other => HlsDownloaderError::SegmentFetchError(format!(
                    "segment {} ({}): {other}",
                    segment.sequence, segment.uri
                )),
            })?;

        let payload = self
            .decryption
            .decrypt_segment(raw, &segment.key, segment.sequence, &self.headers)
            .await?;

        let mut partial = dest.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);
        fs::write(&partial, &payload).await?;
        fs::rename(&partial, dest).await?;

        debug!(msn = segment.sequence, uri = %segment.uri, bytes = payload.len(), "Segment stored");
        Ok(dest.to_path_buf())
    }
}
