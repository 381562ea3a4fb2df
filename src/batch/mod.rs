//! Sequential batch conversion with progress reporting

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{ConversionConfig, OutputNamer};
use crate::error::{FailureKind, LetterboxError, Result};
use crate::processing::ConversionEngine;
use crate::scanner::{scan_ordered, CandidateFile};

pub mod progress;

pub use progress::*;

/// Source and destination of one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub source_directory: PathBuf,
    pub destination_directory: PathBuf,
}

impl ConversionRequest {
    pub fn new<S: Into<PathBuf>, D: Into<PathBuf>>(source: S, destination: D) -> Self {
        Self {
            source_directory: source.into(),
            destination_directory: destination.into(),
        }
    }
}

/// Lifecycle of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Failed,
}

/// Cooperative cancellation flag, checked between files
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the batch to stop before its next file
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Final outcome of a batch that was not aborted
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    /// `Completed` or `Cancelled`
    pub state: BatchState,
    pub stats: BatchStats,
    /// One entry per attempted candidate, in processing order
    pub results: Vec<ConversionResult>,
    pub elapsed: Duration,
}

impl BatchReport {
    /// Results that failed
    pub fn failures(&self) -> impl Iterator<Item = &ConversionResult> {
        self.results.iter().filter(|result| !result.is_success())
    }

    /// Files per second over the whole batch
    pub fn files_per_second(&self) -> f64 {
        if self.elapsed.is_zero() {
            return 0.0;
        }
        self.stats.processed as f64 / self.elapsed.as_secs_f64()
    }
}

/// Runs batches one file at a time
pub struct BatchConverter {
    engine: ConversionEngine,
    config: ConversionConfig,
    cancel: CancelToken,
    state: BatchState,
}

impl BatchConverter {
    /// Create a converter for `config`
    pub fn new(config: ConversionConfig) -> Self {
        Self {
            engine: ConversionEngine::with_config(&config),
            config,
            cancel: CancelToken::new(),
            state: BatchState::Idle,
        }
    }

    /// Share an externally owned cancellation token
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels this converter's batches
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> BatchState {
        self.state
    }

    /// Scan the request's source directory and convert what it holds
    pub async fn run(
        &mut self,
        request: &ConversionRequest,
        sink: &dyn ProgressSink,
    ) -> Result<BatchReport> {
        info!("Starting batch");
        info!("Source: {:?}", request.source_directory);
        info!("Destination: {:?}", request.destination_directory);

        let candidates = match scan_ordered(&request.source_directory, self.config.order).await {
            Ok(candidates) => candidates,
            Err(e) => {
                self.state = BatchState::Failed;
                return Err(e);
            }
        };

        self.convert(
            &candidates,
            &request.source_directory,
            &request.destination_directory,
            sink,
        )
        .await
    }

    /// Convert `candidates` from `source_directory` into `destination_directory`
    ///
    /// Only a destination that cannot be created fails the batch; every
    /// per-file problem is recorded as a [`ConversionResult::Failure`].
    pub async fn convert(
        &mut self,
        candidates: &[CandidateFile],
        source_directory: &Path,
        destination_directory: &Path,
        sink: &dyn ProgressSink,
    ) -> Result<BatchReport> {
        let start_time = Instant::now();

        if let Err(source) = tokio::fs::create_dir_all(destination_directory).await {
            self.state = BatchState::Failed;
            return Err(LetterboxError::DestinationUnavailable {
                path: destination_directory.to_path_buf(),
                source,
            });
        }

        self.state = BatchState::Running;
        let total = candidates.len();
        sink.emit(BatchEvent::Started { total });

        let mut stats = BatchStats::default();
        let mut results = Vec::with_capacity(total);
        let mut namer = OutputNamer::new(self.config.collisions);
        let mut cancelled = false;

        if total == 0 {
            info!("No candidate images found");
            sink.emit(BatchEvent::Progress(ProgressEvent::nothing_found()));
        }

        for (index, candidate) in candidates.iter().enumerate() {
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            sink.emit(BatchEvent::Progress(ProgressEvent::processing(
                &candidate.filename,
                index,
                total,
            )));

            let result = self
                .convert_candidate(candidate, source_directory, destination_directory, &mut namer)
                .await;

            stats.record(&result);
            sink.emit(BatchEvent::FileFinished(result.clone()));
            sink.emit(BatchEvent::Stats(stats));
            results.push(result);
        }

        if cancelled {
            info!("Batch cancelled after {} of {} files", stats.processed, total);
            sink.emit(BatchEvent::Progress(ProgressEvent::cancelled(stats.processed, total)));
            self.state = BatchState::Cancelled;
        } else {
            if total > 0 {
                sink.emit(BatchEvent::Progress(ProgressEvent::finished(total)));
            }
            self.state = BatchState::Completed;
        }

        let report = BatchReport {
            state: self.state,
            stats,
            results,
            elapsed: start_time.elapsed(),
        };

        info!(
            "Batch finished: {} in {:.2}s",
            stats.summary_text(),
            report.elapsed.as_secs_f64()
        );
        sink.emit(BatchEvent::Finished(report.clone()));

        Ok(report)
    }

    async fn convert_candidate(
        &self,
        candidate: &CandidateFile,
        source_directory: &Path,
        destination_directory: &Path,
        namer: &mut OutputNamer,
    ) -> ConversionResult {
        let filename = candidate.filename.clone();
        let input_path = candidate.path_in(source_directory);

        let output_filename = match namer.resolve(&filename) {
            Ok(name) => name,
            Err(e) => return failure(filename, &e),
        };
        let output_path = destination_directory.join(&output_filename);

        match self.engine.convert_file(input_path, output_path).await {
            Ok(converted) => {
                debug!(
                    "Converted {} -> {} ({}x{} placed, {} bytes)",
                    filename,
                    output_filename,
                    converted.placed_width,
                    converted.placed_height,
                    converted.output_size
                );
                namer.commit(output_filename.clone());
                ConversionResult::Success {
                    filename,
                    output_filename,
                }
            }
            Err(e) => failure(filename, &e),
        }
    }
}

fn failure(filename: String, error: &LetterboxError) -> ConversionResult {
    let kind = error.failure_kind().unwrap_or(FailureKind::Io);
    warn!("Failed to process {}: {} ({})", filename, error, kind);

    ConversionResult::Failure {
        filename,
        kind,
        reason: error.user_message(),
    }
}

/// A batch running on its own worker task
pub struct BatchHandle {
    /// Events in emission order; closes once the batch ends
    pub events: mpsc::UnboundedReceiver<BatchEvent>,
    cancel: CancelToken,
    worker: JoinHandle<Result<BatchReport>>,
}

impl BatchHandle {
    /// Stop before the next file
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the worker and return its report
    pub async fn wait(self) -> Result<BatchReport> {
        self.worker
            .await
            .map_err(|e| LetterboxError::system(format!("Batch worker failed: {}", e)))?
    }
}

/// Start `request` on a dedicated worker task
///
/// Must be called from within a tokio runtime. The caller's task stays free
/// to render events from [`BatchHandle::events`].
pub fn spawn_batch(request: ConversionRequest, config: ConversionConfig) -> BatchHandle {
    let (sink, events) = ChannelSink::new();
    let mut converter = BatchConverter::new(config);
    let cancel = converter.cancel_token();

    let worker = tokio::spawn(async move { converter.run(&request, &sink).await });

    BatchHandle {
        events,
        cancel,
        worker,
    }
}

/// Scan and convert in one call, reporting to `sink`
pub async fn run(
    request: &ConversionRequest,
    config: ConversionConfig,
    sink: &dyn ProgressSink,
) -> Result<BatchReport> {
    BatchConverter::new(config).run(request, sink).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CandidateOrder, CollisionPolicy};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_image(dir: &Path, name: &str, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, Rgb([180, 40, 90]))
            .save(dir.join(name))
            .unwrap();
    }

    fn sorted_config() -> ConversionConfig {
        ConversionConfig {
            order: CandidateOrder::Lexicographic,
            ..ConversionConfig::default()
        }
    }

    #[tokio::test]
    async fn test_events_follow_file_order() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_image(src.path(), "a.png", 20, 20);
        std::fs::write(src.path().join("b.jpg"), b"garbage").unwrap();
        write_image(src.path(), "c.bmp", 30, 10);

        let sink = RecordingSink::new();
        let request = ConversionRequest::new(src.path(), dst.path());
        let report = run(&request, sorted_config(), &sink).await.unwrap();

        assert_eq!(report.state, BatchState::Completed);
        assert_eq!(report.stats, BatchStats { processed: 3, succeeded: 2, failed: 1 });

        let messages: Vec<String> = sink.progress().into_iter().map(|p| p.message).collect();
        assert_eq!(
            messages,
            vec![
                "Processing: a.png",
                "Processing: b.jpg",
                "Processing: c.bmp",
                "Finished processing 3 images",
            ]
        );

        // Each file: Progress, FileFinished, Stats, in that order
        let events = sink.events();
        assert!(matches!(events[0], BatchEvent::Started { total: 3 }));
        for (file_index, chunk) in events[1..10].chunks(3).enumerate() {
            assert!(matches!(chunk[0], BatchEvent::Progress(_)));
            assert!(matches!(chunk[1], BatchEvent::FileFinished(_)));
            match &chunk[2] {
                BatchEvent::Stats(stats) => assert_eq!(stats.processed, file_index + 1),
                other => panic!("expected stats, got {:?}", other),
            }
        }
        assert!(matches!(events.last(), Some(BatchEvent::Finished(_))));
    }

    #[tokio::test]
    async fn test_stats_invariant_holds_after_every_update() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        for i in 0..4 {
            write_image(src.path(), &format!("ok{}.png", i), 10 + i, 10);
        }
        std::fs::write(src.path().join("bad1.gif"), b"nope").unwrap();
        std::fs::write(src.path().join("bad2.tiff"), b"").unwrap();

        let sink = RecordingSink::new();
        let request = ConversionRequest::new(src.path(), dst.path());
        run(&request, ConversionConfig::default(), &sink).await.unwrap();

        let updates = sink.stats();
        assert_eq!(updates.len(), 6);
        let mut previous = BatchStats::default();
        for stats in updates {
            assert_eq!(stats.processed, stats.succeeded + stats.failed);
            assert!(stats.processed > previous.processed);
            assert!(stats.succeeded >= previous.succeeded);
            assert!(stats.failed >= previous.failed);
            previous = stats;
        }
        assert_eq!(previous, BatchStats { processed: 6, succeeded: 4, failed: 2 });
    }

    #[tokio::test]
    async fn test_empty_source_creates_destination_only() {
        let src = TempDir::new().unwrap();
        let dst_root = TempDir::new().unwrap();
        let dst = dst_root.path().join("nested").join("out");

        let sink = RecordingSink::new();
        let report = run(&ConversionRequest::new(src.path(), &dst), ConversionConfig::default(), &sink)
            .await
            .unwrap();

        assert_eq!(report.stats, BatchStats::default());
        assert_eq!(report.state, BatchState::Completed);
        assert!(dst.is_dir());
        assert_eq!(std::fs::read_dir(&dst).unwrap().count(), 0);
        assert_eq!(sink.progress(), vec![ProgressEvent::nothing_found()]);
    }

    #[tokio::test]
    async fn test_uncreatable_destination_fails_batch() {
        let src = TempDir::new().unwrap();
        write_image(src.path(), "a.png", 5, 5);
        let blocker = src.path().join("blocker");
        std::fs::write(&blocker, b"file, not a directory").unwrap();

        let mut converter = BatchConverter::new(ConversionConfig::default());
        let sink = RecordingSink::new();
        let err = converter
            .run(&ConversionRequest::new(src.path(), blocker.join("out")), &sink)
            .await
            .unwrap_err();

        assert!(matches!(err, LetterboxError::DestinationUnavailable { .. }));
        assert_eq!(converter.state(), BatchState::Failed);
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_missing_source_fails_batch() {
        let root = TempDir::new().unwrap();
        let mut converter = BatchConverter::new(ConversionConfig::default());
        let err = converter
            .run(
                &ConversionRequest::new(root.path().join("missing"), root.path().join("out")),
                &NullSink,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, LetterboxError::DirectoryAccess { .. }));
        assert_eq!(converter.state(), BatchState::Failed);
        assert!(!root.path().join("out").exists());
    }

    #[tokio::test]
    async fn test_cancel_before_start_returns_partial_report() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_image(src.path(), "a.png", 5, 5);
        write_image(src.path(), "b.png", 5, 5);

        let mut converter = BatchConverter::new(sorted_config());
        converter.cancel_token().cancel();

        let sink = RecordingSink::new();
        let report = converter
            .run(&ConversionRequest::new(src.path(), dst.path()), &sink)
            .await
            .unwrap();

        assert_eq!(report.state, BatchState::Cancelled);
        assert_eq!(report.stats.processed, 0);
        assert_eq!(
            sink.progress().last().map(|p| p.message.clone()),
            Some("Cancelled after 0 of 2 images".to_string())
        );
    }

    #[tokio::test]
    async fn test_cancel_between_files() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        for name in ["a.png", "b.png", "c.png"] {
            write_image(src.path(), name, 5, 5);
        }

        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let sink = move |event: BatchEvent| {
            if let BatchEvent::Stats(stats) = event {
                if stats.processed == 1 {
                    trigger.cancel();
                }
            }
        };

        let mut converter = BatchConverter::new(sorted_config()).with_cancel_token(cancel);
        let report = converter
            .run(&ConversionRequest::new(src.path(), dst.path()), &sink)
            .await
            .unwrap();

        assert_eq!(report.state, BatchState::Cancelled);
        assert_eq!(report.stats, BatchStats { processed: 1, succeeded: 1, failed: 0 });
        assert!(dst.path().join("a.png").exists());
        assert!(!dst.path().join("b.png").exists());
    }

    #[tokio::test]
    async fn test_error_collision_policy_records_conflict() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_image(src.path(), "a.bmp", 5, 5);
        write_image(src.path(), "a.png", 5, 5);

        let config = ConversionConfig {
            collisions: CollisionPolicy::Error,
            ..sorted_config()
        };
        let report = run(&ConversionRequest::new(src.path(), dst.path()), config, &NullSink)
            .await
            .unwrap();

        assert_eq!(report.stats, BatchStats { processed: 2, succeeded: 1, failed: 1 });
        assert_eq!(report.results[1].failure_kind(), Some(FailureKind::Conflict));
    }

    #[tokio::test]
    async fn test_rename_collision_policy() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_image(src.path(), "a.bmp", 5, 5);
        write_image(src.path(), "a.png", 5, 5);

        let config = ConversionConfig {
            collisions: CollisionPolicy::Rename,
            ..sorted_config()
        };
        let report = run(&ConversionRequest::new(src.path(), dst.path()), config, &NullSink)
            .await
            .unwrap();

        assert_eq!(report.stats.succeeded, 2);
        assert!(dst.path().join("a.png").exists());
        assert!(dst.path().join("a-1.png").exists());
    }

    #[tokio::test]
    async fn test_spawned_batch_streams_events() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        write_image(src.path(), "one.png", 600, 300);

        let mut handle = spawn_batch(
            ConversionRequest::new(src.path(), dst.path()),
            ConversionConfig::default(),
        );

        let mut received = Vec::new();
        while let Some(event) = handle.events.recv().await {
            received.push(event);
        }
        let report = handle.wait().await.unwrap();

        assert_eq!(report.stats.succeeded, 1);
        assert!(matches!(received.first(), Some(BatchEvent::Started { total: 1 })));
        assert!(matches!(received.last(), Some(BatchEvent::Finished(_))));
    }
}
