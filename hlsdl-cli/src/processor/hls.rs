use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use hlsdl_engine::{EventSink, HlsConfig, HlsDownloader, Variant};
use tracing::{info, warn};

use super::DownloadJob;
use crate::error::AppError;
use crate::utils::create_dirs;

/// Process an HLS stream
pub async fn process_hls_stream(job: DownloadJob) -> Result<PathBuf, AppError> {
    if let Some(parent) = job.output.parent() {
        create_dirs(parent).await?;
    }

    let start_time = Instant::now();
    let downloader = HlsDownloader::new(job.config)?;

    let progress = job.progress.clone();
    let events = EventSink::new(Arc::new(move |event| progress.handle_event(event)));

    match downloader
        .download(&job.url, &job.output, events, job.cancel)
        .await
    {
        Ok(outcome) => {
            info!(
                path = %outcome.path.display(),
                segments = outcome.segments,
                elapsed = ?start_time.elapsed(),
                "HLS download finished"
            );
            Ok(outcome.path)
        }
        Err(err) => {
            if let Some(fallback) = err.fallback_artifact() {
                warn!(
                    "Remux failed, the unconverted stream was kept at {}",
                    fallback.display()
                );
            }
            Err(err.into())
        }
    }
}

fn describe(variant: &Variant) -> String {
    let resolution = variant
        .resolution
        .map(|r| r.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let bandwidth = variant
        .bandwidth
        .map(|b| format!("{} kbps", b / 1000))
        .unwrap_or_else(|| "? kbps".to_string());
    format!("{resolution:>10}  {bandwidth:>12}  {}", variant.uri)
}

pub async fn print_variants(url: &str, config: HlsConfig) -> Result<(), AppError> {
    let downloader = HlsDownloader::new(config)?;
    let mut variants = downloader.list_variants(url).await?;
    if variants.is_empty() {
        println!("{url} is a media playlist (no variants)");
        return Ok(());
    }

    variants.sort_by_key(|v| std::cmp::Reverse((v.height(), v.bandwidth_or_zero())));
    for variant in &variants {
        println!("{}", describe(variant));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hlsdl_engine::Resolution;

    #[test]
    fn test_describe_variant() {
        let variant = Variant {
            uri: "https://a.example/720p.m3u8".to_string(),
            bandwidth: Some(2_500_000),
            resolution: Some(Resolution {
                width: 1280,
                height: 720,
            }),
        };
        let line = describe(&variant);
        assert!(line.contains("1280x720"));
        assert!(line.contains("2500 kbps"));
        assert!(line.ends_with("https://a.example/720p.m3u8"));
    }
}
