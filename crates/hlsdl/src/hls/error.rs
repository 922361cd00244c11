use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

#[derive(Debug, thiserror::Error, Clone)]
pub enum HlsDownloaderError {
    /// Malformed or ambiguous playlist
    #[error("Playlist error: {0}")]
    PlaylistError(String),
    #[error("Unsupported encryption (DRM) detected: {0}")]
    DrmUnsupported(String),
    #[error("AES-128 key URI missing for segment {0}")]
    KeyMissing(String),
    #[error("Key fetch error: {0}")]
    KeyFetchError(String),
    #[error("Decryption error: {0}")]
    DecryptionError(String),
    #[error("Segment fetch error: {0}")]
    SegmentFetchError(String),
    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },
    #[error("Assembly error: expected {expected} segments but {actual} were downloaded")]
    AssemblyError { expected: usize, actual: usize },
    #[error("Remux error: {0}")]
    RemuxError(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Network error: {source}")]
    NetworkError {
        #[from]
        source: Arc<reqwest::Error>,
    },
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: Arc<std::io::Error>,
    },
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Operation cancelled")]
    Cancelled,
}

// Manual implementation of From<reqwest::Error> for HlsDownloaderError
// because of the Arc wrapping.
impl From<reqwest::Error> for HlsDownloaderError {
    fn from(err: reqwest::Error) -> Self {
        HlsDownloaderError::NetworkError {
            source: Arc::new(err),
        }
    }
}

impl From<std::io::Error> for HlsDownloaderError {
    fn from(err: std::io::Error) -> Self {
        HlsDownloaderError::IoError {
            source: Arc::new(err),
        }
    }
}

/// States of the download pipeline, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    FetchingMaster,
    SelectingVariant,
    FetchingMedia,
    CheckingDrm,
    ParsingSegments,
    Downloading,
    Assembling,
    Remuxing,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::FetchingMaster => "fetch playlist",
            PipelineStage::SelectingVariant => "select variant",
            PipelineStage::FetchingMedia => "fetch media playlist",
            PipelineStage::CheckingDrm => "DRM check",
            PipelineStage::ParsingSegments => "parse segments",
            PipelineStage::Downloading => "download",
            PipelineStage::Assembling => "assemble",
            PipelineStage::Remuxing => "remux",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// A fatal pipeline failure tagged with the stage it happened in.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct PipelineError {
    pub stage: PipelineStage,
    #[source]
    pub source: HlsDownloaderError,
    /// Concatenated stream kept when only the remux step failed
    pub fallback: Option<PathBuf>,
}

impl PipelineError {
    pub fn new(stage: PipelineStage, source: HlsDownloaderError) -> Self {
        Self {
            stage,
            source,
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, path: PathBuf) -> Self {
        self.fallback = Some(path);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.source, HlsDownloaderError::Cancelled)
    }
}
