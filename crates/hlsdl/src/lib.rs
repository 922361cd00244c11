//! # hlsdl-engine
//!
//! A library for retrieving HTTP Live Streaming (HLS) content and
//! reassembling it into a single playable file.
//!
//! ## Features
//!
//! - Master and media playlist parsing, tolerant of unknown tags
//! - Variant selection by resolution or bandwidth preference
//! - Bounded-concurrency segment downloads with AES-128 decryption
//! - Cooperative cancellation and progress events
//! - Ordered byte concatenation and optional stream-copy remux
//! - Plain HTTP download for direct media URLs

pub mod builder;
pub mod client;
pub mod config;
pub mod direct;
pub mod error;
pub mod hls;
pub mod protocol_builder;
pub mod proxy;

pub use builder::DownloaderConfigBuilder;
pub use client::create_client;
pub use config::DownloaderConfig;
pub use direct::{DownloadMode, download_direct};
pub use error::DownloadError;

pub use hls::{
    DownloadEvent, DownloadOutcome, EventCallback, EventSink, HlsConfig, HlsDownloader,
    HlsDownloaderError, PipelineError, PipelineStage, Resolution, Variant, VariantPreference,
};

// Re-export protocol builders
pub use protocol_builder::HlsProtocolBuilder;

// Re-export proxy utilities
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType};

// Callers cancel downloads through this token
pub use tokio_util::sync::CancellationToken;
