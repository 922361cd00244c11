// HLS Segment Scheduler: runs segment downloads on a bounded pool and keeps
// the results in playlist order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::hls::config::HlsSchedulerConfig;
use crate::hls::events::{EventSink, ProgressTracker};
use crate::hls::fetcher::SegmentDownloader;
use crate::hls::playlist::Segment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub index: usize,
    pub target: PathBuf,
    pub state: JobState,
}

pub struct SegmentScheduler {
    downloader: Arc<dyn SegmentDownloader>,
    concurrency: usize,
    events: EventSink,
}

impl SegmentScheduler {
    pub fn new(
        downloader: Arc<dyn SegmentDownloader>,
        config: &HlsSchedulerConfig,
        events: EventSink,
    ) -> Self {
        Self {
            downloader,
            concurrency: config.download_concurrency.max(1),
            events,
        }
    }

    /// File a segment at `index` is written to. Distinct per index, so no
    /// two jobs ever share a path.
    pub fn segment_path(dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("seg_{index:06}.ts"))
    }

    /// Downloads every segment into `dest_dir`.
    ///
    /// Returns the paths that completed, in input order. Failed segments are
    /// logged and left out; after `cancel` fires no new job is started while
    /// jobs already running are allowed to finish.
    pub async fn download_all(
        &self,
        segments: &[Segment],
        dest_dir: &Path,
        cancel: &CancellationToken,
    ) -> Vec<PathBuf> {
        let total = segments.len();
        let tracker = ProgressTracker::new(total, self.events.clone());
        let mut jobs: Vec<DownloadJob> = (0..total)
            .map(|index| DownloadJob {
                index,
                target: Self::segment_path(dest_dir, index),
                state: JobState::Pending,
            })
            .collect();
        let mut slots: Vec<Option<PathBuf>> = vec![None; total];

        info!(total, concurrency = self.concurrency, "Starting segment downloads");

        let mut in_flight = FuturesUnordered::new();
        let mut next = 0;

        loop {
            while in_flight.len() < self.concurrency && next < total {
                if cancel.is_cancelled() {
                    break;
                }
                let job = &mut jobs[next];
                job.state = JobState::Running;
                let index = job.index;
                let target = job.target.clone();
                let segment = segments[index].clone();
                let downloader = Arc::clone(&self.downloader);
                in_flight.push(async move {
                    let result = downloader.fetch_segment(&segment, &target).await;
                    (index, result)
                });
                next += 1;
            }

            let Some((index, result)) = in_flight.next().await else {
                break;
            };

            match result {
                Ok(path) => {
                    jobs[index].state = JobState::Done;
                    slots[index] = Some(path);
                    let done = tracker.record();
                    debug!(index, done, total, "Segment done");
                }
                Err(e) => {
                    jobs[index].state = JobState::Failed;
                    let segment = &segments[index];
                    warn!(index, msn = segment.sequence, uri = %segment.uri, error = %e, "Segment failed");
                    self.events
                        .log(format!("Segment {index} failed: {e}"));
                }
            }
        }

        let mut cancelled = 0;
        for job in jobs.iter_mut().filter(|j| j.state == JobState::Pending) {
            job.state = JobState::Cancelled;
            cancelled += 1;
        }
        let failed = jobs.iter().filter(|j| j.state == JobState::Failed).count();
        let completed: Vec<PathBuf> = slots.into_iter().flatten().collect();

        info!(
            completed = completed.len(),
            failed, cancelled, total, "Segment downloads finished"
        );
        completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hls::HlsDownloaderError;
    use crate::hls::events::DownloadEvent;
    use crate::hls::fetcher::SegmentFetcher;
    use crate::hls::http::mock::MemoryTransport;
    use crate::hls::config::HlsConfig;
    use crate::hls::output::Assembler;
    use crate::hls::playlist::KeyInfo;
    use async_trait::async_trait;
    use reqwest::header::HeaderMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn uri(i: usize) -> String {
        format!("https://cdn.example.com/seg{i}.ts")
    }

    fn segments(n: usize) -> Vec<Segment> {
        (0..n)
            .map(|i| Segment {
                uri: uri(i),
                duration: Some(2.0),
                key: KeyInfo::default(),
                sequence: i as u64,
            })
            .collect()
    }

    fn body(i: usize) -> Vec<u8> {
        vec![i as u8; 100 + i]
    }

    fn transport(n: usize) -> MemoryTransport {
        (0..n).fold(MemoryTransport::new(), |t, i| t.with_body(&uri(i), body(i)))
    }

    fn scheduler(transport: Arc<MemoryTransport>, concurrency: usize, events: EventSink) -> SegmentScheduler {
        let fetcher = SegmentFetcher::new(transport, &HlsConfig::default(), HeaderMap::new());
        SegmentScheduler::new(
            Arc::new(fetcher),
            &HlsSchedulerConfig {
                download_concurrency: concurrency,
            },
            events,
        )
    }

    #[tokio::test]
    async fn test_results_follow_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(transport(12).with_delay(Duration::from_millis(5)));
        let scheduler = scheduler(transport, 4, EventSink::disabled());

        let paths = scheduler
            .download_all(&segments(12), dir.path(), &CancellationToken::new())
            .await;

        assert_eq!(paths.len(), 12);
        for (i, path) in paths.iter().enumerate() {
            assert_eq!(path, &SegmentScheduler::segment_path(dir.path(), i));
            assert_eq!(std::fs::read(path).unwrap(), body(i));
        }
    }

    #[tokio::test]
    async fn test_failed_segment_is_absent_and_assembly_rejects() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(transport(10).with_failure(&uri(4)));
        let logs = Arc::new(Mutex::new(Vec::new()));
        let captured = logs.clone();
        let events = EventSink::new(Arc::new(move |event| {
            if let DownloadEvent::Log { message } = event {
                captured.lock().unwrap().push(message);
            }
        }));
        let scheduler = scheduler(transport, 3, events);

        let paths = scheduler
            .download_all(&segments(10), dir.path(), &CancellationToken::new())
            .await;

        assert_eq!(paths.len(), 9);
        assert!(!paths.contains(&SegmentScheduler::segment_path(dir.path(), 4)));
        assert!(logs.lock().unwrap().iter().any(|m| m.contains("Segment 4 failed")));

        let err = Assembler::concatenate(&paths, 10, &dir.path().join("merged.ts"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            HlsDownloaderError::AssemblyError {
                expected: 10,
                actual: 9
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_stops_new_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(transport(10).with_delay(Duration::from_millis(20)));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let events = EventSink::new(Arc::new(move |event| {
            if let DownloadEvent::Progress { completed, .. } = event
                && completed >= 2
            {
                trigger.cancel();
            }
        }));
        let concurrency = 3;
        let scheduler = scheduler(transport.clone(), concurrency, events);

        let paths = scheduler.download_all(&segments(10), dir.path(), &cancel).await;

        assert!(paths.len() >= 2);
        assert!(paths.len() <= 2 + concurrency);
        let started = (0..10).filter(|&i| transport.request_count(&uri(i)) > 0).count();
        assert!(started < 10);
        assert!(started <= 2 + concurrency);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(transport(5));
        let scheduler = scheduler(transport.clone(), 2, EventSink::disabled());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let paths = scheduler.download_all(&segments(5), dir.path(), &cancel).await;
        assert!(paths.is_empty());
        assert_eq!(transport.count_of_kind(crate::hls::http::RequestKind::Segment), 0);
    }

    struct CountingDownloader {
        running: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl SegmentDownloader for CountingDownloader {
        async fn fetch_segment(
            &self,
            _segment: &Segment,
            dest: &Path,
        ) -> Result<PathBuf, HlsDownloaderError> {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(dest.to_path_buf())
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let downloader = Arc::new(CountingDownloader {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let scheduler = SegmentScheduler::new(
            downloader.clone(),
            &HlsSchedulerConfig {
                download_concurrency: 3,
            },
            EventSink::disabled(),
        );
        let paths = scheduler
            .download_all(&segments(9), Path::new("/unused"), &CancellationToken::new())
            .await;
        assert_eq!(paths.len(), 9);
        assert!(downloader.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_zero_concurrency_is_clamped() {
        let downloader = Arc::new(CountingDownloader {
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let scheduler = SegmentScheduler::new(
            downloader.clone(),
            &HlsSchedulerConfig {
                download_concurrency: 0,
            },
            EventSink::disabled(),
        );
        let paths = scheduler
            .download_all(&segments(3), Path::new("/unused"), &CancellationToken::new())
            .await;
        assert_eq!(paths.len(), 3);
        assert_eq!(downloader.peak.load(Ordering::SeqCst), 1);
    }
}
