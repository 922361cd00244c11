// HTTP seam between the pipeline and the network.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::HeaderMap;
use tracing::{debug, warn};

use crate::hls::HlsDownloaderError;
use crate::hls::config::HlsConfig;

/// What a request is for. Each kind has its own timeout and retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Playlist,
    Segment,
    Key,
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GETs `url` and returns the full body.
    async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        kind: RequestKind,
    ) -> Result<Bytes, HlsDownloaderError>;

    /// GETs `url` and decodes the body as text (lossy UTF-8).
    async fn get_text(&self, url: &str, headers: &HeaderMap) -> Result<String, HlsDownloaderError> {
        let body = self.get(url, headers, RequestKind::Playlist).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[derive(Debug, Clone, Copy)]
struct RetryPolicy {
    timeout: Duration,
    max_retries: u32,
    delay_base: Duration,
}

/// `HttpTransport` over a shared `reqwest::Client`.
///
/// Client errors (4xx) fail at once. Server errors, connect failures and
/// timeouts are retried with exponential backoff.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    config: Arc<HlsConfig>,
}

impl ReqwestTransport {
    pub fn new(client: Client, config: Arc<HlsConfig>) -> Self {
        Self { client, config }
    }

    fn policy(&self, kind: RequestKind) -> RetryPolicy {
        let fetcher = &self.config.fetcher_config;
        match kind {
            RequestKind::Playlist => RetryPolicy {
                timeout: self.config.playlist_config.playlist_fetch_timeout,
                max_retries: self.config.playlist_config.max_playlist_retries,
                delay_base: self.config.playlist_config.playlist_retry_delay_base,
            },
            RequestKind::Segment => RetryPolicy {
                timeout: fetcher.segment_download_timeout,
                max_retries: fetcher.max_segment_retries,
                delay_base: fetcher.segment_retry_delay_base,
            },
            RequestKind::Key => RetryPolicy {
                timeout: fetcher.key_download_timeout,
                max_retries: fetcher.max_key_retries,
                delay_base: fetcher.key_retry_delay_base,
            },
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &HeaderMap,
        kind: RequestKind,
    ) -> Result<Bytes, HlsDownloaderError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| HlsDownloaderError::InvalidUrl(format!("{url}: {e}")))?;
        let policy = self.policy(kind);

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            let result = self
                .client
                .get(parsed.clone())
                .headers(headers.clone())
                .timeout(policy.timeout)
                .send()
                .await;

            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.bytes().await.map_err(HlsDownloaderError::from);
                    }
                    if status.is_client_error() || attempts > policy.max_retries {
                        return Err(HlsDownloaderError::HttpStatus {
                            url: url.to_string(),
                            status: status.as_u16(),
                        });
                    }
                    debug!(url, status = status.as_u16(), attempt = attempts, ?kind, "Retrying after server error");
                }
                Err(e) => {
                    if !e.is_connect() && !e.is_timeout() && !e.is_request() {
                        return Err(HlsDownloaderError::from(e));
                    }
                    if attempts > policy.max_retries {
                        warn!(url, attempts, error = %e, "Giving up after network errors");
                        return Err(HlsDownloaderError::from(e));
                    }
                    debug!(url, attempt = attempts, ?kind, error = %e, "Retrying after network error");
                }
            }

            let delay = policy.delay_base * 2_u32.saturating_pow(attempts.saturating_sub(1));
            tokio::time::sleep(delay).await;
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MemoryTransport;
    use super::*;

    #[tokio::test]
    async fn test_get_text_is_lossy() {
        let transport = MemoryTransport::new().with_body("https://a.example/p.m3u8", &b"#EXTM3U\n\xff"[..]);
        let text = transport
            .get_text("https://a.example/p.m3u8", &HeaderMap::new())
            .await
            .unwrap();
        assert!(text.starts_with("#EXTM3U\n"));
        assert_eq!(transport.count_of_kind(RequestKind::Playlist), 1);
    }

    fn reqwest_transport() -> ReqwestTransport {
        let config = Arc::new(HlsConfig::default());
        let client = crate::create_client(&config.base).unwrap();
        ReqwestTransport::new(client, config)
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_before_request() {
        let transport = reqwest_transport();
        let err = transport
            .get("not a url", &HeaderMap::new(), RequestKind::Segment)
            .await
            .unwrap_err();
        assert!(matches!(err, HlsDownloaderError::InvalidUrl(_)));
    }

    #[test]
    fn test_policies_follow_config() {
        let transport = reqwest_transport();
        let key = transport.policy(RequestKind::Key);
        assert_eq!(key.timeout, Duration::from_secs(10));
        assert_eq!(key.delay_base, Duration::from_millis(200));
        let segment = transport.policy(RequestKind::Segment);
        assert_eq!(segment.max_retries, 3);
        assert_eq!(
            transport.policy(RequestKind::Playlist).timeout,
            Duration::from_secs(15)
        );
    }

    #[test]
    fn test_playlist_backoff_is_independent_of_segments() {
        let config = Arc::new(
            crate::HlsProtocolBuilder::new()
                .segment_retry_delay_base(Duration::from_secs(4))
                .playlist_retry_count(5)
                .playlist_retry_delay_base(Duration::from_millis(250))
                .into_config(),
        );
        let client = crate::create_client(&config.base).unwrap();
        let transport = ReqwestTransport::new(client, config);

        let playlist = transport.policy(RequestKind::Playlist);
        assert_eq!(playlist.max_retries, 5);
        assert_eq!(playlist.delay_base, Duration::from_millis(250));
        assert_eq!(
            transport.policy(RequestKind::Segment).delay_base,
            Duration::from_secs(4)
        );
    }
}
