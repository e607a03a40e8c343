//! Progress reporting and cancellation support for the export pipeline.
//!
//! Exports may run for a long time when cells are executed. This module lets
//! callers follow progress cell by cell and cancel from another thread.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_eda::{Exporter, CancellationToken};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! // In another thread
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(30));
//!     token_clone.cancel();
//! });
//!
//! let artifact = Exporter::builder()
//!     .cancellation_token(token)
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.stage, update.message);
//!     })
//!     .build()
//!     .export(&document, TargetFormat::Html, ExecutionPolicy::ContinueOnError)?;
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStage {
    /// Opening the execution session
    Starting,
    /// Running cells
    Executing,
    /// Producing the artifact bytes
    Rendering,
    /// Writing the artifact to its destination
    Writing,
    /// Export finished; failed cells may still be recorded in the manifest
    Complete,
    /// Export was cancelled by the caller
    Cancelled,
    /// Export failed
    Failed,
}

impl ExportStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Starting => "Starting Session",
            Self::Executing => "Executing Cells",
            Self::Rendering => "Rendering",
            Self::Writing => "Writing Artifact",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Share of the overall export spent in this stage (0.0 - 1.0).
    pub fn weight(&self) -> f32 {
        match self {
            Self::Starting => 0.05,
            Self::Executing => 0.80,
            Self::Rendering => 0.10,
            Self::Writing => 0.05,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Starting => 0.0,
            Self::Executing => 0.05,
            Self::Rendering => 0.85,
            Self::Writing => 0.95,
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
        }
    }
}

/// Progress update emitted during an export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: ExportStage,

    /// Section of the cell being executed, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,

    /// Cells processed so far while executing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cells_processed: Option<usize>,

    /// Total cells while executing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cells_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates a progress update for a stage.
    pub fn new(stage: ExportStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            section: None,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            cells_processed: None,
            cells_total: None,
        }
    }

    /// Creates an execution update for cell `current` of `total`.
    pub fn cell(
        section: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage = ExportStage::Executing;
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            section: Some(section.into()),
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            cells_processed: Some(current),
            cells_total: Some(total),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            progress: 1.0,
            stage_progress: 1.0,
            ..Self::new(ExportStage::Complete, 1.0, message)
        }
    }

    pub fn cancelled() -> Self {
        Self::new(ExportStage::Cancelled, 0.0, "Export cancelled by user")
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(ExportStage::Failed, 0.0, message)
    }
}

/// Receiver of progress updates.
///
/// Implementations must be `Send + Sync` so that an export can run on a
/// background thread while updates are consumed elsewhere.
pub trait ProgressReporter: Send + Sync {
    /// Called at stage boundaries and once per executed cell.
    fn report(&self, update: ProgressUpdate);
}

/// [`ProgressReporter`] backed by a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running export.
///
/// Clones share state. The exporter checks the token between cells and
/// returns [`ExportError::Cancelled`](crate::error::ExportError::Cancelled)
/// once it is set; the execution session is released either way.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another export.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_cancellation_token_clone_shares_state() {
        let token1 = CancellationToken::new();
        let token2 = token1.clone();
        assert!(!token2.is_cancelled());

        token1.cancel();
        assert!(token2.is_cancelled());

        token2.reset();
        assert!(!token1.is_cancelled());
    }

    #[test]
    fn test_cell_update_progress() {
        let update = ProgressUpdate::cell("Correlation", 5, 10, "Running cell 5");
        assert_eq!(update.stage, ExportStage::Executing);
        assert_eq!(update.stage_progress, 0.5);
        assert!((update.progress - 0.45).abs() < 1e-6);
        assert_eq!(update.section.as_deref(), Some("Correlation"));
        assert_eq!(update.cells_total, Some(10));
    }

    #[test]
    fn test_complete_update() {
        let update = ProgressUpdate::complete("Done");
        assert_eq!(update.stage, ExportStage::Complete);
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_stage_weights_sum() {
        let stages = [
            ExportStage::Starting,
            ExportStage::Executing,
            ExportStage::Rendering,
            ExportStage::Writing,
        ];
        let total: f32 = stages.iter().map(|s| s.weight()).sum();
        assert!((total - 1.0).abs() < 0.01);
        for pair in stages.windows(2) {
            let expected = pair[0].base_progress() + pair[0].weight();
            assert!((pair[1].base_progress() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_progress_update_json() {
        let update = ProgressUpdate::cell("Overview", 1, 4, "cell 1");
        let json = serde_json::to_string(&update).unwrap();
        assert!(json.contains("\"stage\":\"executing\""));
        assert!(json.contains("\"cells_processed\":1"));

        let json = serde_json::to_string(&ProgressUpdate::cancelled()).unwrap();
        assert!(!json.contains("section"));
    }

    #[test]
    fn test_closure_reporter_across_threads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = calls.clone();
        let reporter = Arc::new(ClosureProgressReporter::new(move |_update| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));

        let reporter_clone = reporter.clone();
        std::thread::spawn(move || {
            reporter_clone.report(ProgressUpdate::new(ExportStage::Rendering, 0.5, "render"));
        })
        .join()
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
