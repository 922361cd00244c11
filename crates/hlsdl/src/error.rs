use reqwest::StatusCode;

use crate::hls::{HlsDownloaderError, PipelineError};

// Top-level error type for download operations
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    UrlError(String),

    #[error("Server returned status code {0}")]
    StatusCode(StatusCode),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid proxy configuration: {0}")]
    ProxyError(String),

    #[error("TLS configuration error: {0}")]
    TlsError(String),

    #[error("Download cancelled")]
    Cancelled,

    #[error("HLS error: {0}")]
    HlsError(#[from] HlsDownloaderError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl DownloadError {
    /// The pre-remux artifact left behind when only the remux step failed.
    pub fn fallback_artifact(&self) -> Option<&std::path::Path> {
        match self {
            DownloadError::Pipeline(err) => err.fallback.as_deref(),
            _ => None,
        }
    }
}
