//! # Builder for DownloaderConfig
//!
//! Fluent construction of [`DownloaderConfig`]. The external collaborator
//! that discovered the stream hands over its request headers here.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use hlsdl_engine::DownloaderConfig;
//!
//! let config = DownloaderConfig::builder()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("MyApp/1.0")
//!     .with_referer("https://example.com/watch/42")
//!     .with_cookie("session=abc")
//!     .build();
//!
//! assert_eq!(config.headers.get("referer").unwrap(), "https://example.com/watch/42");
//! ```

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::{DownloaderConfig, proxy::ProxyConfig};

/// Builder for creating DownloaderConfig instances with a fluent API
#[derive(Debug, Clone)]
pub struct DownloaderConfigBuilder {
    config: DownloaderConfig,
}

impl DownloaderConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: DownloaderConfig::default(),
        }
    }

    /// Set the overall timeout for the entire HTTP request
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout (time to establish initial connection)
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the idle timeout for pooled connections
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set whether to follow redirects
    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.config.follow_redirects = follow;
        self
    }

    /// Set the user agent string. Also sent as an explicit header so
    /// segment and key requests carry the same value.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        if let Ok(value) = HeaderValue::from_str(&user_agent) {
            self.config
                .headers
                .insert(reqwest::header::USER_AGENT, value);
        }
        self.config.user_agent = user_agent;
        self
    }

    pub fn with_referer(self, referer: impl AsRef<str>) -> Self {
        self.with_header(reqwest::header::REFERER.as_str(), referer)
    }

    pub fn with_cookie(self, cookie: impl AsRef<str>) -> Self {
        self.with_header(reqwest::header::COOKIE.as_str(), cookie)
    }

    pub fn with_origin(self, origin: impl AsRef<str>) -> Self {
        self.with_header(reqwest::header::ORIGIN.as_str(), origin)
    }

    /// Add a custom HTTP header. Invalid names or values are skipped with a warning.
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        match (
            name.as_ref().parse::<HeaderName>(),
            HeaderValue::from_str(value.as_ref()),
        ) {
            (Ok(name), Ok(value)) => {
                self.config.headers.insert(name, value);
            }
            _ => warn!(name = name.as_ref(), "Ignoring invalid HTTP header"),
        }
        self
    }

    /// Merge headers over the current set, replacing values with the same name
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        for (name, value) in headers.iter() {
            self.config.headers.insert(name.clone(), value.clone());
        }
        self
    }

    /// Set the proxy configuration
    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.config.proxy = Some(proxy);
        self.config.use_system_proxy = false; // Explicit proxy overrides system proxy
        self
    }

    /// Set whether to use system proxy settings if available
    pub fn with_system_proxy(mut self, use_system_proxy: bool) -> Self {
        // Only set system proxy if no explicit proxy is configured
        if self.config.proxy.is_none() {
            self.config.use_system_proxy = use_system_proxy;
        }
        self
    }

    /// Build the DownloaderConfig instance
    pub fn build(self) -> DownloaderConfig {
        self.config
    }
}

impl Default for DownloaderConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
