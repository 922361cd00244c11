// HLS retrieval pipeline: playlists, variant selection, segment download,
// decryption and assembly.

pub mod config;
pub mod coordinator;
pub mod decryption;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod hls_downloader;
pub mod http;
pub mod output;
pub mod playlist;
pub mod scheduler;
pub mod selector;
pub mod uri;

// Re-exports for easier access
pub use config::{HlsConfig, VariantPreference};
pub use coordinator::{DownloadOutcome, HlsPipeline};
pub use error::{HlsDownloaderError, PipelineError, PipelineStage};
pub use events::{DownloadEvent, EventCallback, EventSink};
pub use hls_downloader::HlsDownloader;
pub use http::{HttpTransport, ReqwestTransport, RequestKind};
pub use playlist::{KeyInfo, KeyMethod, Resolution, Segment, Variant};
