//! # Protocol Builder
//!
//! Fluent construction of an [`HlsDownloader`] without touching the nested
//! configuration structs directly.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::hls::config::VariantPreference;
use crate::hls::{HlsConfig, HlsDownloader, Resolution};
use crate::proxy::ProxyConfig;
use crate::{DownloadError, DownloaderConfig};

/// Builder for HLS downloaders
pub struct HlsProtocolBuilder {
    config: HlsConfig,
}

impl HlsProtocolBuilder {
    /// Create a new HLS protocol builder with default configuration
    pub fn new() -> Self {
        Self {
            config: HlsConfig::default(),
        }
    }

    pub fn with_base_config(mut self, base_config: DownloaderConfig) -> Self {
        self.config.base = base_config;
        self
    }

    // --- Base DownloaderConfig methods ---

    /// Set user agent for HTTP requests
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.base.user_agent = user_agent.into();
        self
    }

    /// Set overall HTTP timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.base.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.base.connect_timeout = timeout;
        self
    }

    /// Set HTTP headers
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.config.base.headers = headers;
        self
    }

    /// Add a single HTTP header. Invalid names or values are ignored.
    pub fn add_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (HeaderName::from_str(name), HeaderValue::from_str(value)) {
            self.config.base.headers.insert(name, value);
        }
        self
    }

    pub fn proxy(mut self, proxy_config: ProxyConfig) -> Self {
        self.config.base.proxy = Some(proxy_config);
        self
    }

    pub fn use_system_proxy(mut self, use_system_proxy: bool) -> Self {
        self.config.base.use_system_proxy = use_system_proxy;
        self
    }

    // --- Playlist ---

    pub fn playlist_timeout(mut self, timeout: Duration) -> Self {
        self.config.playlist_config.playlist_fetch_timeout = timeout;
        self
    }

    pub fn playlist_retry_count(mut self, retries: u32) -> Self {
        self.config.playlist_config.max_playlist_retries = retries;
        self
    }

    pub fn playlist_retry_delay_base(mut self, delay: Duration) -> Self {
        self.config.playlist_config.playlist_retry_delay_base = delay;
        self
    }

    pub fn variant_preference(mut self, preference: VariantPreference) -> Self {
        self.config.playlist_config.variant_preference = preference;
        self
    }

    /// Prefer the variant matching (or best fitting under) this resolution.
    pub fn prefer_resolution(mut self, width: u32, height: u32) -> Self {
        self.config.playlist_config.variant_preference.resolution =
            Some(Resolution { width, height });
        self
    }

    /// Prefer the best variant at or below this bandwidth (bits/s).
    pub fn max_bandwidth(mut self, bandwidth: u64) -> Self {
        self.config.playlist_config.variant_preference.max_bandwidth = Some(bandwidth);
        self
    }

    // --- Scheduler ---

    /// Set maximum concurrent segment downloads.
    pub fn download_concurrency(mut self, concurrency: usize) -> Self {
        self.config.scheduler_config.download_concurrency = concurrency.max(1);
        self
    }

    // --- Fetcher ---

    pub fn segment_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.segment_download_timeout = timeout;
        self
    }

    pub fn segment_retry_count(mut self, retries: u32) -> Self {
        self.config.fetcher_config.max_segment_retries = retries;
        self
    }

    pub fn segment_retry_delay_base(mut self, delay: Duration) -> Self {
        self.config.fetcher_config.segment_retry_delay_base = delay;
        self
    }

    pub fn key_timeout(mut self, timeout: Duration) -> Self {
        self.config.fetcher_config.key_download_timeout = timeout;
        self
    }

    pub fn key_retry_count(mut self, retries: u32) -> Self {
        self.config.fetcher_config.max_key_retries = retries;
        self
    }

    pub fn key_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.decryption_config.key_cache_ttl = ttl;
        self
    }

    // --- Output ---

    /// Repackage into MP4 after concatenation.
    pub fn remux(mut self, remux: bool) -> Self {
        self.config.output_config.remux = remux;
        self
    }

    pub fn ffmpeg_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_config.ffmpeg_path = path.into();
        self
    }

    /// Keep segment files in this directory so an interrupted run can resume.
    pub fn work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_config.work_dir = Some(dir.into());
        self
    }

    pub fn keep_segments(mut self, keep: bool) -> Self {
        self.config.output_config.keep_segments = keep;
        self
    }

    pub fn get_config(&self) -> &HlsConfig {
        &self.config
    }

    pub fn into_config(self) -> HlsConfig {
        self.config
    }

    pub fn build(self) -> Result<HlsDownloader, DownloadError> {
        HlsDownloader::with_config(self.config)
    }
}

impl Default for HlsProtocolBuilder {
    fn default() -> Self {
        Self::new()
    }
}
