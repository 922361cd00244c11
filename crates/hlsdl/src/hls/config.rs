use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::DownloaderConfig;
use crate::hls::playlist::Resolution;

// --- Top-Level Configuration ---
#[derive(Debug, Clone, Default)]
pub struct HlsConfig {
    /// Base downloader configuration
    pub base: DownloaderConfig,
    pub playlist_config: HlsPlaylistConfig,
    pub scheduler_config: HlsSchedulerConfig,
    pub fetcher_config: HlsFetcherConfig,
    pub decryption_config: HlsDecryptionConfig,
    pub output_config: HlsOutputConfig,
}

// --- Playlist Configuration ---
#[derive(Debug, Clone)]
pub struct HlsPlaylistConfig {
    pub playlist_fetch_timeout: Duration,
    pub max_playlist_retries: u32,
    pub playlist_retry_delay_base: Duration, // Base for exponential backoff
    pub variant_preference: VariantPreference,
}

impl Default for HlsPlaylistConfig {
    fn default() -> Self {
        Self {
            playlist_fetch_timeout: Duration::from_secs(15),
            max_playlist_retries: 2,
            playlist_retry_delay_base: Duration::from_millis(500),
            variant_preference: VariantPreference::default(),
        }
    }
}

/// What the caller would like to watch. Resolution wins over bandwidth when
/// both are set; with neither, the highest bandwidth variant is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VariantPreference {
    pub resolution: Option<Resolution>,
    /// Upper bound in bits per second
    pub max_bandwidth: Option<u64>,
}

impl VariantPreference {
    /// Builds a preference from the loosely formatted strings a front end
    /// collects. Unparseable values are dropped with a warning.
    pub fn from_strings(resolution: Option<&str>, bandwidth: Option<&str>) -> Self {
        let resolution = resolution.filter(|s| !s.trim().is_empty()).and_then(|s| {
            let parsed = Resolution::parse(s);
            if parsed.is_none() {
                warn!(value = s, "Ignoring malformed resolution preference");
            }
            parsed
        });
        let max_bandwidth = bandwidth.filter(|s| !s.trim().is_empty()).and_then(|s| {
            let parsed = parse_bandwidth(s);
            if parsed.is_none() {
                warn!(value = s, "Ignoring malformed bandwidth preference");
            }
            parsed
        });
        Self {
            resolution,
            max_bandwidth,
        }
    }
}

/// Parses a bandwidth in bits per second. Accepts plain integers and
/// `k`/`m` suffixes (`2500k`, `5M`).
pub fn parse_bandwidth(s: &str) -> Option<u64> {
    let s = s.trim().to_ascii_lowercase();
    let s = s.strip_suffix("bps").unwrap_or(s.as_str());
    let (digits, multiplier) = if let Some(n) = s.strip_suffix('k') {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 1_000_000)
    } else {
        (s, 1)
    };
    let value: f64 = digits.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * multiplier as f64).round() as u64)
}

// --- Scheduler Configuration ---
#[derive(Debug, Clone)]
pub struct HlsSchedulerConfig {
    pub download_concurrency: usize, // Max concurrent segment downloads
}

impl Default for HlsSchedulerConfig {
    fn default() -> Self {
        Self {
            download_concurrency: 4,
        }
    }
}

// --- Fetcher Configuration ---
#[derive(Debug, Clone)]
pub struct HlsFetcherConfig {
    pub segment_download_timeout: Duration,
    pub max_segment_retries: u32,
    pub segment_retry_delay_base: Duration, // Base for exponential backoff
    pub key_download_timeout: Duration,
    pub max_key_retries: u32,
    pub key_retry_delay_base: Duration,
}

impl Default for HlsFetcherConfig {
    fn default() -> Self {
        Self {
            segment_download_timeout: Duration::from_secs(30),
            max_segment_retries: 3,
            segment_retry_delay_base: Duration::from_millis(500),
            key_download_timeout: Duration::from_secs(10),
            max_key_retries: 3,
            key_retry_delay_base: Duration::from_millis(200),
        }
    }
}

// --- Decryption Configuration ---
#[derive(Debug, Clone)]
pub struct HlsDecryptionConfig {
    pub key_cache_ttl: Duration, // TTL for keys in the in-memory cache
    pub key_cache_capacity: u64,
}

impl Default for HlsDecryptionConfig {
    fn default() -> Self {
        Self {
            key_cache_ttl: Duration::from_secs(60 * 60),
            key_cache_capacity: 64,
        }
    }
}

// --- Output Configuration ---
#[derive(Debug, Clone)]
pub struct HlsOutputConfig {
    /// Repackage the concatenated stream with the external tool
    pub remux: bool,
    pub ffmpeg_path: PathBuf,
    /// Persistent directory for segment files. A temporary directory is
    /// used when unset.
    pub work_dir: Option<PathBuf>,
    /// Keep segment files in `work_dir` after a successful assembly
    pub keep_segments: bool,
}

impl Default for HlsOutputConfig {
    fn default() -> Self {
        Self {
            remux: true,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            work_dir: None,
            keep_segments: false,
        }
    }
}
