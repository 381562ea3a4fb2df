//! Progress events, statistics and sinks

use std::sync::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::batch::BatchReport;
use crate::error::FailureKind;

/// Running counters for one batch
///
/// `processed == succeeded + failed` after every update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchStats {
    /// Count a converted file
    pub fn record_success(&mut self) {
        self.succeeded += 1;
        self.processed += 1;
    }

    /// Count a failed file
    pub fn record_failure(&mut self) {
        self.failed += 1;
        self.processed += 1;
    }

    /// Record the outcome of one file
    pub fn record(&mut self, result: &ConversionResult) {
        if result.is_success() {
            self.record_success();
        } else {
            self.record_failure();
        }
    }

    /// Statistics line, e.g. "3 Images Converted | 2 Success | 1 Fail"
    pub fn status_text(&self) -> String {
        format!(
            "{} Images Converted | {} Success | {} Fail",
            self.processed, self.succeeded, self.failed
        )
    }

    /// Closing summary, e.g. "2 succeeded / 1 failed"
    pub fn summary_text(&self) -> String {
        format!("{} succeeded / {} failed", self.succeeded, self.failed)
    }
}

/// Outcome of one candidate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionResult {
    Success {
        filename: String,
        output_filename: String,
    },
    Failure {
        filename: String,
        kind: FailureKind,
        reason: String,
    },
}

impl ConversionResult {
    /// Input filename this result belongs to
    pub fn filename(&self) -> &str {
        match self {
            Self::Success { filename, .. } | Self::Failure { filename, .. } => filename,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Failure classification, if any
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Status message plus completion percentage in `[0, 100]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub message: String,
    pub percent: f64,
}

impl ProgressEvent {
    /// Emitted before file `index` (0-based) of `total` is attempted
    pub fn processing(filename: &str, index: usize, total: usize) -> Self {
        Self {
            message: format!("Processing: {}", filename),
            percent: percent_of(index + 1, total),
        }
    }

    /// Emitted once every candidate has been attempted
    pub fn finished(total: usize) -> Self {
        Self {
            message: format!("Finished processing {} images", total),
            percent: 100.0,
        }
    }

    /// Emitted when the scan produced no candidates
    pub fn nothing_found() -> Self {
        Self {
            message: "No images found in the selected folder".to_string(),
            percent: 0.0,
        }
    }

    /// Emitted when a batch stops early on request
    pub fn cancelled(processed: usize, total: usize) -> Self {
        Self {
            message: format!("Cancelled after {} of {} images", processed, total),
            percent: percent_of(processed, total),
        }
    }
}

fn percent_of(done: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
}

/// Everything a batch reports while it runs
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Started { total: usize },
    Progress(ProgressEvent),
    FileFinished(ConversionResult),
    Stats(BatchStats),
    Finished(BatchReport),
}

/// Receiver of batch events
///
/// Implementations must not block for long; the worker waits on every call.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: BatchEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(BatchEvent) + Send + Sync,
{
    fn emit(&self, event: BatchEvent) {
        self(event);
    }
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: BatchEvent) {}
}

/// Forwards events over a channel to another task
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<BatchEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver its events arrive on
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BatchEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelSink {
    fn emit(&self, event: BatchEvent) {
        // A dropped receiver only means nobody is watching
        let _ = self.sender.send(event);
    }
}

/// Keeps every event in memory, in emission order
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<BatchEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<BatchEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Only the progress events
    pub fn progress(&self) -> Vec<ProgressEvent> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                BatchEvent::Progress(progress) => Some(progress),
                _ => None,
            })
            .collect()
    }

    /// Only the statistics updates
    pub fn stats(&self) -> Vec<BatchStats> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                BatchEvent::Stats(stats) => Some(stats),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: BatchEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
