// HLS Pipeline: drives one download from the first playlist fetch to the
// final output file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::header::HeaderMap;
use tempfile::TempDir;
use tokio::fs;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::hls::config::HlsConfig;
use crate::hls::error::{HlsDownloaderError, PipelineError, PipelineStage};
use crate::hls::events::{DownloadEvent, EventSink};
use crate::hls::fetcher::SegmentFetcher;
use crate::hls::http::HttpTransport;
use crate::hls::output::{Assembler, normalize_output_path};
use crate::hls::playlist::{
    Segment, Variant, detect_unsupported_drm, is_master_playlist, parse_master_playlist,
    parse_media_playlist,
};
use crate::hls::scheduler::SegmentScheduler;
use crate::hls::selector::select_variant;

const MERGED_FILE: &str = "merged.ts";

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    /// Chosen rendition when the source was a master playlist
    pub variant: Option<Variant>,
    pub segments: usize,
}

/// Directory holding segment files for one run.
enum WorkDir {
    Temporary(TempDir),
    Persistent(PathBuf),
}

impl WorkDir {
    fn path(&self) -> &Path {
        match self {
            WorkDir::Temporary(dir) => dir.path(),
            WorkDir::Persistent(path) => path,
        }
    }

    fn is_persistent(&self) -> bool {
        matches!(self, WorkDir::Persistent(_))
    }
}

pub struct HlsPipeline {
    config: Arc<HlsConfig>,
    transport: Arc<dyn HttpTransport>,
    headers: HeaderMap,
    events: EventSink,
    cancel: CancellationToken,
}

impl HlsPipeline {
    pub fn new(
        config: Arc<HlsConfig>,
        transport: Arc<dyn HttpTransport>,
        headers: HeaderMap,
        events: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            transport,
            headers,
            events,
            cancel,
        }
    }

    fn enter(&self, stage: PipelineStage) -> Result<(), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(self.fail(stage, HlsDownloaderError::Cancelled));
        }
        debug!(%stage, "Entering stage");
        self.events.emit(DownloadEvent::StageChanged { stage });
        Ok(())
    }

    fn fail(&self, stage: PipelineStage, source: HlsDownloaderError) -> PipelineError {
        self.fail_with(PipelineError::new(stage, source))
    }

    fn fail_with(&self, err: PipelineError) -> PipelineError {
        error!(stage = %err.stage, error = %err.source, "Pipeline failed");
        self.events.emit(DownloadEvent::Failed {
            message: err.to_string(),
        });
        err
    }

    async fn fetch_text(&self, stage: PipelineStage, url: &str) -> Result<String, PipelineError> {
        self.transport
            .get_text(url, &self.headers)
            .await
            .map_err(|e| self.fail(stage, e))
    }

    /// Fetches `url` and returns the variants it lists. Empty for a media
    /// playlist.
    pub async fn list_variants(&self, url: &str) -> Result<Vec<Variant>, PipelineError> {
        self.enter(PipelineStage::FetchingMaster)?;
        let text = self.fetch_text(PipelineStage::FetchingMaster, url).await?;
        if !is_master_playlist(&text) {
            return Ok(Vec::new());
        }
        let variants = parse_master_playlist(&text, url);
        if variants.is_empty() {
            return Err(self.fail(
                PipelineStage::SelectingVariant,
                HlsDownloaderError::PlaylistError(
                    "master playlist markers present but no variants found".to_string(),
                ),
            ));
        }
        Ok(variants)
    }

    /// Downloads the stream at `url` into `output`. The extension of
    /// `output` is adjusted to the container actually produced.
    pub async fn run(&self, url: &str, output: &Path) -> Result<DownloadOutcome, PipelineError> {
        info!(url, "Starting HLS download");

        self.enter(PipelineStage::FetchingMaster)?;
        let initial = self.fetch_text(PipelineStage::FetchingMaster, url).await?;

        let (media_url, media_text, variant) = if is_master_playlist(&initial) {
            let variant = self.choose_variant(&initial, url)?;
            self.enter(PipelineStage::FetchingMedia)?;
            let text = self
                .fetch_text(PipelineStage::FetchingMedia, &variant.uri)
                .await?;
            (variant.uri.clone(), text, Some(variant))
        } else {
            self.events.log("Source is a media playlist");
            (url.to_string(), initial, None)
        };

        self.enter(PipelineStage::CheckingDrm)?;
        if let Some(found) = detect_unsupported_drm(&media_text) {
            return Err(self.fail(
                PipelineStage::CheckingDrm,
                HlsDownloaderError::DrmUnsupported(found),
            ));
        }

        self.enter(PipelineStage::ParsingSegments)?;
        let segments = parse_media_playlist(&media_text, &media_url);
        if segments.is_empty() {
            return Err(self.fail(
                PipelineStage::ParsingSegments,
                HlsDownloaderError::PlaylistError("no segments found in media playlist".to_string()),
            ));
        }
        self.events.emit(DownloadEvent::SegmentsDiscovered {
            count: segments.len(),
        });

        self.enter(PipelineStage::Downloading)?;
        let work_dir = self
            .prepare_work_dir()
            .await
            .map_err(|e| self.fail(PipelineStage::Downloading, e))?;
        let paths = self.download(&segments, work_dir.path()).await?;

        self.enter(PipelineStage::Assembling)?;
        let merged = work_dir.path().join(MERGED_FILE);
        Assembler::concatenate(&paths, segments.len(), &merged)
            .await
            .map_err(|e| self.fail(PipelineStage::Assembling, e))?;
        if work_dir.is_persistent() && !self.config.output_config.keep_segments {
            remove_files(&paths).await;
        }

        let path = self.finish_output(&merged, output).await?;

        self.events.emit(DownloadEvent::StageChanged {
            stage: PipelineStage::Done,
        });
        self.events.log(format!("Saved {}", path.display()));
        self.events.emit(DownloadEvent::Finished { path: path.clone() });

        Ok(DownloadOutcome {
            path,
            variant,
            segments: segments.len(),
        })
    }

    fn choose_variant(&self, text: &str, url: &str) -> Result<Variant, PipelineError> {
        self.enter(PipelineStage::SelectingVariant)?;
        let variants = parse_master_playlist(text, url);
        self.events
            .log(format!("Master playlist lists {} variants", variants.len()));

        let preference = &self.config.playlist_config.variant_preference;
        let Some(variant) = select_variant(&variants, preference) else {
            return Err(self.fail(
                PipelineStage::SelectingVariant,
                HlsDownloaderError::PlaylistError(
                    "master playlist markers present but no variants found".to_string(),
                ),
            ));
        };

        info!(
            uri = %variant.uri,
            bandwidth = ?variant.bandwidth,
            resolution = ?variant.resolution,
            "Variant selected"
        );
        self.events.emit(DownloadEvent::VariantSelected {
            uri: variant.uri.clone(),
            bandwidth: variant.bandwidth,
            resolution: variant.resolution,
        });
        Ok(variant.clone())
    }

    async fn prepare_work_dir(&self) -> Result<WorkDir, HlsDownloaderError> {
        match &self.config.output_config.work_dir {
            Some(dir) => {
                fs::create_dir_all(dir).await?;
                Ok(WorkDir::Persistent(dir.clone()))
            }
            None => {
                let dir = tempfile::Builder::new().prefix("hlsdl-").tempdir()?;
                Ok(WorkDir::Temporary(dir))
            }
        }
    }

    async fn download(
        &self,
        segments: &[Segment],
        dir: &Path,
    ) -> Result<Vec<PathBuf>, PipelineError> {
        let concurrency = self.config.scheduler_config.download_concurrency.max(1);
        self.events.log(format!(
            "Downloading {} segments (concurrency={concurrency})",
            segments.len()
        ));

        let fetcher = SegmentFetcher::new(self.transport.clone(), &self.config, self.headers.clone());
        let scheduler = SegmentScheduler::new(
            Arc::new(fetcher),
            &self.config.scheduler_config,
            self.events.clone(),
        );
        let paths = scheduler.download_all(segments, dir, &self.cancel).await;

        // Partial results after a cancel are never assembled
        if self.cancel.is_cancelled() {
            return Err(self.fail(PipelineStage::Downloading, HlsDownloaderError::Cancelled));
        }
        Ok(paths)
    }

    async fn finish_output(&self, merged: &Path, output: &Path) -> Result<PathBuf, PipelineError> {
        let output_config = &self.config.output_config;
        let final_path = normalize_output_path(output, output_config.remux);

        if !output_config.remux {
            Assembler::move_file(merged, &final_path)
                .await
                .map_err(|e| self.fail(PipelineStage::Assembling, e))?;
            return Ok(final_path);
        }

        self.enter(PipelineStage::Remuxing)?;
        match Assembler::remux(&output_config.ffmpeg_path, merged, &final_path).await {
            Ok(()) => {
                if let Err(e) = fs::remove_file(merged).await {
                    debug!(path = %merged.display(), error = %e, "Could not remove merged stream");
                }
                Ok(final_path)
            }
            Err(remux_err) => {
                let fallback = final_path.with_extension("ts");
                let err = PipelineError::new(PipelineStage::Remuxing, remux_err);
                match Assembler::move_file(merged, &fallback).await {
                    Ok(()) => {
                        self.events.log(format!(
                            "Remux failed, concatenated stream kept at {}",
                            fallback.display()
                        ));
                        Err(self.fail_with(err.with_fallback(fallback)))
                    }
                    Err(e) => {
                        warn!(error = %e, "Could not keep concatenated stream after remux failure");
                        Err(self.fail_with(err))
                    }
                }
            }
        }
    }
}

async fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        if let Err(e) = fs::remove_file(path).await {
            debug!(path = %path.display(), error = %e, "Could not remove segment file");
        }
    }
}
