use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hlsdl_engine::{EventSink, create_client, download_direct};
use tracing::info;

use super::DownloadJob;
use crate::error::AppError;
use crate::utils::create_dirs;

/// Stream a plain media URL straight to disk
pub async fn process_direct_download(job: DownloadJob) -> Result<PathBuf, AppError> {
    if let Some(parent) = job.output.parent() {
        create_dirs(parent).await?;
    }

    let start_time = Instant::now();
    let base = &job.config.base;
    let client = create_client(base)?;
    let headers = base.request_headers();

    let progress = job.progress.clone();
    let events = EventSink::new(Arc::new(move |event| progress.handle_event(event)));

    let path = download_direct(
        &client,
        &job.url,
        &job.output,
        &headers,
        &events,
        &job.cancel,
    )
    .await?;

    info!(
        path = %path.display(),
        elapsed = ?start_time.elapsed(),
        "Direct download finished"
    );
    Ok(path)
}
