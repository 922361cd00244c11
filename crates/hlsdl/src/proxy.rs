use std::str::FromStr;

use reqwest::Proxy;

use crate::DownloadError;

/// Which traffic a proxy applies to
#[derive(Debug, Clone, PartialEq, Eq, Copy)]
pub enum ProxyType {
    Http,
    Https,
    Socks5,
    /// Route every scheme through the proxy
    All,
}

impl FromStr for ProxyType {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(ProxyType::Http),
            "https" => Ok(ProxyType::Https),
            "socks5" => Ok(ProxyType::Socks5),
            "all" => Ok(ProxyType::All),
            other => Err(DownloadError::ProxyError(format!(
                "unknown proxy type '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g., "http://proxy.example.com:8080")
    pub url: String,
    pub proxy_type: ProxyType,
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    /// Proxy URL with a `socks5://` scheme forced for SOCKS proxies given as `host:port`
    fn normalized_url(&self) -> String {
        if self.proxy_type == ProxyType::Socks5 && !self.url.contains("://") {
            format!("socks5://{}", self.url)
        } else {
            self.url.clone()
        }
    }

    /// Convert into a reqwest proxy
    pub fn to_reqwest(&self) -> Result<Proxy, DownloadError> {
        let url = self.normalized_url();
        let proxy = match self.proxy_type {
            ProxyType::Http => Proxy::http(&url),
            ProxyType::Https => Proxy::https(&url),
            ProxyType::Socks5 | ProxyType::All => Proxy::all(&url),
        }
        .map_err(|e| DownloadError::ProxyError(format!("invalid proxy URL {url}: {e}")))?;

        Ok(match &self.auth {
            Some(auth) => proxy.basic_auth(&auth.username, &auth.password),
            None => proxy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_type_from_str() {
        assert_eq!("HTTP".parse::<ProxyType>().unwrap(), ProxyType::Http);
        assert_eq!("socks5".parse::<ProxyType>().unwrap(), ProxyType::Socks5);
        assert!("ftp".parse::<ProxyType>().is_err());
    }

    #[test]
    fn test_socks_url_gets_scheme() {
        let config = ProxyConfig {
            url: "127.0.0.1:1080".to_string(),
            proxy_type: ProxyType::Socks5,
            auth: None,
        };
        assert_eq!(config.normalized_url(), "socks5://127.0.0.1:1080");
        assert!(config.to_reqwest().is_ok());
    }

    #[test]
    fn test_http_proxy_with_auth() {
        let config = ProxyConfig {
            url: "http://proxy.example.com:8080".to_string(),
            proxy_type: ProxyType::Http,
            auth: Some(ProxyAuth {
                username: "user".to_string(),
                password: "pass".to_string(),
            }),
        };
        assert!(config.to_reqwest().is_ok());
    }
}
