use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::hls::coordinator::{DownloadOutcome, HlsPipeline};
use crate::hls::events::EventSink;
use crate::hls::http::{HttpTransport, ReqwestTransport};
use crate::hls::playlist::Variant;
use crate::{DownloadError, create_client};

use super::HlsConfig;

/// Entry point for HLS downloads. Cheap to share; each call runs its own
/// pipeline.
pub struct HlsDownloader {
    config: Arc<HlsConfig>,
    transport: Arc<dyn HttpTransport>,
}

impl HlsDownloader {
    pub fn new(config: HlsConfig) -> Result<Self, DownloadError> {
        Self::with_config(config)
    }

    /// Create a new HlsDownloader with custom configuration
    pub fn with_config(config: HlsConfig) -> Result<Self, DownloadError> {
        let config = Arc::new(config);
        let client = create_client(&config.base)?;
        let transport = Arc::new(ReqwestTransport::new(client, Arc::clone(&config)));
        Ok(Self { config, transport })
    }

    /// Uses `transport` for every request instead of a network client.
    pub fn with_transport(config: HlsConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    pub fn config(&self) -> &HlsConfig {
        &self.config
    }

    fn pipeline(&self, events: EventSink, cancel: CancellationToken) -> HlsPipeline {
        HlsPipeline::new(
            Arc::clone(&self.config),
            Arc::clone(&self.transport),
            self.config.base.request_headers(),
            events,
            cancel,
        )
    }

    /// Downloads the stream behind `url` into `output`.
    pub async fn download(
        &self,
        url: &str,
        output: &Path,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Result<DownloadOutcome, DownloadError> {
        self.pipeline(events, cancel)
            .run(url, output)
            .await
            .map_err(DownloadError::from)
    }

    /// Lists the variants of a master playlist without downloading.
    pub async fn list_variants(&self, url: &str) -> Result<Vec<Variant>, DownloadError> {
        self.pipeline(EventSink::disabled(), CancellationToken::new())
            .list_variants(url)
            .await
            .map_err(DownloadError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::http::mock::MemoryTransport;
    use reqwest::header::{HeaderValue, REFERER, USER_AGENT};

    #[tokio::test]
    async fn test_configured_headers_reach_transport() {
        let url = "https://cdn.example.com/v/index.m3u8";
        let transport = Arc::new(
            MemoryTransport::new()
                .with_body(url, "#EXTM3U\n#EXTINF:2,\na.ts\n")
                .with_body("https://cdn.example.com/v/a.ts", "A"),
        );
        let mut config = HlsConfig::default();
        config.output_config.remux = false;
        config
            .base
            .headers
            .insert(REFERER, HeaderValue::from_static("https://page.example/watch"));

        let downloader = HlsDownloader::with_transport(config, transport.clone());
        let out = tempfile::tempdir().unwrap();
        let outcome = downloader
            .download(
                url,
                &out.path().join("v"),
                EventSink::disabled(),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(std::fs::read(outcome.path).unwrap(), b"A");

        let headers = transport.last_headers().unwrap();
        assert_eq!(headers.get(REFERER).unwrap(), "https://page.example/watch");
        assert!(headers.contains_key(USER_AGENT));
    }

    #[tokio::test]
    async fn test_pipeline_error_surfaces_as_download_error() {
        let downloader = HlsDownloader::with_transport(
            HlsConfig::default(),
            Arc::new(MemoryTransport::new()),
        );
        let err = downloader
            .list_variants("https://cdn.example.com/missing.m3u8")
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Pipeline(_)));
        assert!(err.to_string().contains("fetch playlist failed"));
    }
}
