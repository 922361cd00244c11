mod direct;
mod hls;

use std::path::PathBuf;

use hlsdl_engine::{CancellationToken, DownloadMode, HlsConfig};
use tracing::info;

use crate::error::AppError;
use crate::utils::progress::ProgressManager;

/// Everything needed to retrieve one source.
pub struct DownloadJob {
    pub url: String,
    pub output: PathBuf,
    pub mode: DownloadMode,
    pub config: HlsConfig,
    pub progress: ProgressManager,
    pub cancel: CancellationToken,
}

/// Picks the retrieval path for the job's URL and runs it.
pub async fn process_job(job: DownloadJob) -> Result<PathBuf, AppError> {
    let mode = job.mode.resolve(&job.url);
    info!(url = %job.url, mode = %mode, "Starting download");

    match mode {
        DownloadMode::Hls => hls::process_hls_stream(job).await,
        DownloadMode::Http | DownloadMode::Auto => direct::process_direct_download(job).await,
    }
}

/// Prints the variants of a master playlist, best first.
pub async fn list_variants(url: &str, config: HlsConfig) -> Result<(), AppError> {
    hls::print_variants(url, config).await
}
