use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};

use crate::proxy::ProxyConfig;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// HTTP-level options shared by playlist, key and segment requests
#[derive(Debug, Clone)]
pub struct DownloaderConfig {
    /// Overall timeout for the entire HTTP request
    pub timeout: Duration,

    /// Connection timeout (time to establish initial connection)
    pub connect_timeout: Duration,

    /// Idle timeout for pooled connections
    pub read_timeout: Duration,

    /// Whether to follow redirects
    pub follow_redirects: bool,

    /// User agent string
    pub user_agent: String,

    /// Headers sent with every request. The caller's User-Agent, Referer,
    /// Cookie and Origin end up here.
    pub headers: HeaderMap,

    /// Proxy configuration (optional)
    pub proxy: Option<ProxyConfig>,

    /// Whether to use system proxy settings if available
    pub use_system_proxy: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            follow_redirects: true,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            headers: DownloaderConfig::get_default_headers(),
            proxy: None,
            use_system_proxy: true,
        }
    }
}

impl DownloaderConfig {
    pub fn builder() -> crate::builder::DownloaderConfigBuilder {
        crate::builder::DownloaderConfigBuilder::new()
    }

    /// Rebuilds `config` with the default headers underneath the caller's.
    /// Caller headers win for the same name.
    pub fn with_config(config: DownloaderConfig) -> Self {
        let mut headers = DownloaderConfig::get_default_headers();
        for (name, value) in config.headers.iter() {
            headers.insert(name.clone(), value.clone());
        }

        Self { headers, ..config }
    }

    /// Headers for a single request: the configured headers plus the user
    /// agent when the caller did not supply one explicitly.
    pub fn request_headers(&self) -> HeaderMap {
        let mut headers = self.headers.clone();
        if !headers.contains_key(reqwest::header::USER_AGENT)
            && let Ok(value) = HeaderValue::from_str(&self.user_agent)
        {
            headers.insert(reqwest::header::USER_AGENT, value);
        }
        headers
    }

    pub fn get_default_headers() -> HeaderMap {
        let mut default_headers = HeaderMap::new();

        default_headers.insert(
            reqwest::header::ACCEPT_ENCODING,
            HeaderValue::from_static("gzip, deflate, br"),
        );

        default_headers.insert(
            reqwest::header::CONNECTION,
            HeaderValue::from_static("keep-alive"),
        );

        default_headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("*/*"));

        default_headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );
        default_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_config_merges_caller_headers_over_defaults() {
        let mut headers = HeaderMap::new();
        headers.insert(reqwest::header::ACCEPT, HeaderValue::from_static("video/*"));
        headers.insert(
            reqwest::header::REFERER,
            HeaderValue::from_static("https://example.com/watch"),
        );

        let config = DownloaderConfig::with_config(DownloaderConfig {
            headers,
            ..Default::default()
        });

        assert_eq!(config.headers.get(reqwest::header::ACCEPT).unwrap(), "video/*");
        assert_eq!(
            config.headers.get(reqwest::header::REFERER).unwrap(),
            "https://example.com/watch"
        );
        assert!(config.headers.contains_key(reqwest::header::ACCEPT_LANGUAGE));
    }

    #[test]
    fn test_request_headers_keeps_explicit_user_agent() {
        let mut config = DownloaderConfig::default();
        assert_eq!(
            config.request_headers().get(reqwest::header::USER_AGENT).unwrap(),
            DEFAULT_USER_AGENT
        );

        config.headers.insert(
            reqwest::header::USER_AGENT,
            HeaderValue::from_static("Capture/2.0"),
        );
        assert_eq!(
            config.request_headers().get(reqwest::header::USER_AGENT).unwrap(),
            "Capture/2.0"
        );
    }
}
