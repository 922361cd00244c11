use std::sync::{Arc, Mutex};
use std::time::Duration;

use hlsdl_engine::DownloadEvent;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing::{debug, info};

fn segment_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg}\n[{elapsed_precise}] [{bar:40.green/white}] {pos}/{len} segments ({percent}%) eta {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn bytes_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {msg}\n[{elapsed_precise}] [{bar:40.green/white}] {bytes}/{total_bytes} @ {bytes_per_sec}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

/// How download events reach the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutput {
    /// One progress bar plus the regular log lines
    Bar,
    /// Every event as a JSON line on stdout
    Json,
}

/// Renders [`DownloadEvent`]s for a single download.
#[derive(Clone)]
pub struct ProgressManager {
    output: EventOutput,
    bar: Arc<Mutex<Option<ProgressBar>>>,
    hidden: bool,
}

impl ProgressManager {
    pub fn new(output: EventOutput) -> Self {
        Self {
            output,
            bar: Arc::new(Mutex::new(None)),
            hidden: false,
        }
    }

    #[cfg(test)]
    fn new_hidden() -> Self {
        Self {
            output: EventOutput::Bar,
            bar: Arc::new(Mutex::new(None)),
            hidden: true,
        }
    }

    fn new_bar(&self, len: u64, style: ProgressStyle) -> ProgressBar {
        let bar = if self.hidden {
            ProgressBar::with_draw_target(Some(len), ProgressDrawTarget::hidden())
        } else {
            let bar = ProgressBar::new(len);
            bar.enable_steady_tick(Duration::from_millis(500));
            bar
        };
        bar.set_style(style);
        bar
    }

    pub fn handle_event(&self, event: DownloadEvent) {
        match self.output {
            EventOutput::Json => {
                if let Some(line) = json_line(&event) {
                    println!("{line}");
                }
            }
            EventOutput::Bar => self.render(event),
        }
    }

    fn render(&self, event: DownloadEvent) {
        let Ok(mut slot) = self.bar.lock() else {
            return;
        };
        match event {
            DownloadEvent::StageChanged { stage } => {
                debug!("Stage: {stage}");
                if let Some(bar) = slot.as_ref() {
                    bar.set_message(stage.to_string());
                }
            }
            DownloadEvent::VariantSelected {
                uri,
                bandwidth,
                resolution,
            } => {
                let resolution = resolution.map(|r| r.to_string()).unwrap_or_else(|| "?".into());
                let bandwidth = bandwidth.map(|b| b.to_string()).unwrap_or_else(|| "?".into());
                info!("Selected variant {resolution} @ {bandwidth} bps: {uri}");
            }
            DownloadEvent::SegmentsDiscovered { count } => {
                let bar = self.new_bar(count as u64, segment_style());
                bar.set_message("download");
                *slot = Some(bar);
            }
            DownloadEvent::Progress {
                completed, total, ..
            } => {
                let bar = slot.get_or_insert_with(|| {
                    let bar = self.new_bar(total as u64, bytes_style());
                    bar.set_message("download");
                    bar
                });
                bar.set_length(total as u64);
                bar.set_position(completed as u64);
            }
            // Already mirrored to the log by the engine
            DownloadEvent::Log { .. } => {}
            DownloadEvent::Finished { path } => {
                if let Some(bar) = slot.take() {
                    bar.finish_with_message(format!("Saved {}", path.display()));
                }
            }
            DownloadEvent::Failed { message } => {
                if let Some(bar) = slot.take() {
                    bar.abandon_with_message(format!("Failed: {message}"));
                }
            }
        }
    }

    #[cfg(test)]
    fn position(&self) -> Option<(u64, Option<u64>)> {
        let slot = self.bar.lock().ok()?;
        slot.as_ref().map(|bar| (bar.position(), bar.length()))
    }
}

/// Serializes one event as a single JSON line.
pub fn json_line(event: &DownloadEvent) -> Option<String> {
    serde_json::to_string(event).ok()
}
