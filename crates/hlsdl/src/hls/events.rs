use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use serde::Serialize;
use tracing::info;

use crate::hls::error::PipelineStage;
use crate::hls::playlist::Resolution;

/// Everything the pipeline reports to its caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DownloadEvent {
    StageChanged {
        stage: PipelineStage,
    },
    VariantSelected {
        uri: String,
        bandwidth: Option<u64>,
        resolution: Option<Resolution>,
    },
    SegmentsDiscovered {
        count: usize,
    },
    Progress {
        completed: usize,
        total: usize,
        percent: u8,
    },
    Log {
        message: String,
    },
    Finished {
        path: PathBuf,
    },
    Failed {
        message: String,
    },
}

pub type EventCallback = Arc<dyn Fn(DownloadEvent) + Send + Sync>;

/// Cloneable handle that forwards events to an optional callback.
#[derive(Clone, Default)]
pub struct EventSink {
    callback: Option<EventCallback>,
}

impl EventSink {
    pub fn new(callback: EventCallback) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    pub fn disabled() -> Self {
        Self { callback: None }
    }

    pub fn emit(&self, event: DownloadEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    /// Sends a free-text line to the caller and mirrors it to `tracing`.
    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        info!("{message}");
        self.emit(DownloadEvent::Log { message });
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink")
            .field("enabled", &self.callback.is_some())
            .finish()
    }
}

/// Counts completed jobs and emits `Progress` only when the integer
/// percentage moves. Safe to share between concurrent jobs.
#[derive(Debug)]
pub struct ProgressTracker {
    total: usize,
    completed: AtomicUsize,
    last_percent: AtomicU8,
    sink: EventSink,
}

impl ProgressTracker {
    pub fn new(total: usize, sink: EventSink) -> Self {
        Self {
            total,
            completed: AtomicUsize::new(0),
            // Above any real percentage so the first completion always reports
            last_percent: AtomicU8::new(u8::MAX),
            sink,
        }
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Acquire)
    }

    /// Records one more completion. Returns the new count.
    pub fn record(&self) -> usize {
        let done = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        let percent = percent_of(done, self.total);
        let previous = self.last_percent.swap(percent, Ordering::AcqRel);
        if previous != percent {
            self.sink.emit(DownloadEvent::Progress {
                completed: done,
                total: self.total,
                percent,
            });
        }
        done
    }
}

pub fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) as u128 * 100) / total as u128) as u8
}
