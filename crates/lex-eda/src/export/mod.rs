//! Export pipeline: execute a [`Document`] and render it to an artifact.
//!
//! Use [`Exporter::builder()`] to configure the execution engine, progress
//! reporting and cancellation, then call [`Exporter::export`] or
//! [`Exporter::export_to`].

mod engine;
mod progress;
mod python;
mod render;

pub use engine::{CellFailure, DryRunEngine, ExecutionEngine, ExecutionSession, SessionGuard};
pub use progress::{
    CancellationToken, ClosureProgressReporter, ExportStage, ProgressReporter, ProgressUpdate,
};
pub use python::{DRIVER_SOURCE, PythonEngine};
pub use render::{
    HtmlRenderer, NotebookRenderer, Renderer, ScriptRenderer, TargetFormat, renderer_for,
};

use crate::error::{CellExecutionError, ExportError, Result};
use crate::executed::{CellOutput, CellResult, ExecutedDocument};
use crate::report::Document;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What to do when a code cell fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPolicy {
    /// Stop at the first failing cell and return [`ExportError::Execution`].
    FailFast,
    /// Record the failure as the cell's result and keep going.
    #[default]
    ContinueOnError,
}

/// Overall outcome of a finished export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportStatus {
    Success,
    /// The artifact was produced but some cells failed.
    PartialSuccess,
}

/// A cell that failed during export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedCell {
    pub index: usize,
    pub section: String,
    pub ename: String,
    pub evalue: String,
}

impl From<&CellExecutionError> for FailedCell {
    fn from(error: &CellExecutionError) -> Self {
        Self {
            index: error.cell_index,
            section: error.section.clone(),
            ename: error.ename.clone(),
            evalue: error.evalue.clone(),
        }
    }
}

/// Summary of an export, shipped alongside the artifact bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format: TargetFormat,
    pub status: ExportStatus,
    pub title: String,
    /// Name of the execution engine that ran the cells.
    pub engine: String,
    pub cells_total: usize,
    /// Code cells sent to the engine.
    pub cells_executed: usize,
    pub failures: Vec<FailedCell>,
    /// When the artifact was rendered (RFC 3339). Not part of the artifact bytes.
    pub generated_at: String,
}

impl Manifest {
    fn from_executed(format: TargetFormat, engine: &str, executed: &ExecutedDocument) -> Self {
        let failures: Vec<FailedCell> = executed.failures().map(FailedCell::from).collect();
        let status = if failures.is_empty() {
            ExportStatus::Success
        } else {
            ExportStatus::PartialSuccess
        };
        Self {
            format,
            status,
            title: executed.title.clone(),
            engine: engine.to_string(),
            cells_total: executed.len(),
            cells_executed: executed.cells.iter().filter(|c| c.cell.is_code()).count(),
            failures,
            generated_at: Utc::now().to_rfc3339(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExportStatus::Success
    }
}

/// The rendered result of an export.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub format: TargetFormat,
    pub bytes: Vec<u8>,
    pub manifest: Manifest,
}

impl Artifact {
    /// Write the artifact bytes to `path`, creating parent directories.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &self.bytes)?;
        info!(path = %path.display(), bytes = self.bytes.len(), "Artifact written");
        Ok(())
    }
}

/// Executes documents and renders them.
///
/// # Example
///
/// ```rust,ignore
/// use lex_eda::{Exporter, ExecutionPolicy, PythonEngine, TargetFormat};
/// use std::sync::Arc;
///
/// let artifact = Exporter::builder()
///     .engine(Arc::new(PythonEngine::new()))
///     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
///     .build()
///     .export(&document, TargetFormat::Html, ExecutionPolicy::ContinueOnError)?;
/// ```
pub struct Exporter {
    engine: Arc<dyn ExecutionEngine>,
    renderers: HashMap<TargetFormat, Arc<dyn Renderer>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(Exporter: Send);

impl Default for Exporter {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Exporter {
    pub fn builder() -> ExporterBuilder {
        ExporterBuilder::default()
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Execute `document` and render it as `format`.
    ///
    /// # Errors
    ///
    /// - [`ExportError::Cancelled`] if the token was cancelled between cells.
    /// - [`ExportError::Execution`] for the first failing cell under
    ///   [`ExecutionPolicy::FailFast`].
    /// - [`ExportError::Session`] if the engine could not start or broke.
    /// - [`ExportError::Rendering`] if the renderer failed.
    pub fn export(
        &self,
        document: &Document,
        format: TargetFormat,
        policy: ExecutionPolicy,
    ) -> Result<Artifact> {
        let result = self
            .execute(document, policy)
            .and_then(|executed| self.render(&executed, format));
        self.finish(result)
    }

    /// Export and write the artifact to `destination`.
    pub fn export_to(
        &self,
        document: &Document,
        format: TargetFormat,
        policy: ExecutionPolicy,
        destination: impl AsRef<Path>,
    ) -> Result<Artifact> {
        let result = self
            .execute(document, policy)
            .and_then(|executed| self.render(&executed, format))
            .and_then(|artifact| {
                self.check_cancelled()?;
                self.report_progress(ProgressUpdate::new(
                    ExportStage::Writing,
                    0.0,
                    format!("Writing {}", destination.as_ref().display()),
                ));
                artifact.write_to(destination.as_ref())?;
                Ok(artifact)
            });
        self.finish(result)
    }

    /// Run every cell of `document` in one session.
    ///
    /// Progress is reported per cell; the session is closed on every exit
    /// path.
    pub fn execute(&self, document: &Document, policy: ExecutionPolicy) -> Result<ExecutedDocument> {
        let start_time = Instant::now();
        self.check_cancelled()?;

        info!(engine = self.engine.name(), ?policy, "Starting export of '{}'", document.title());
        self.report_progress(ProgressUpdate::new(
            ExportStage::Starting,
            0.0,
            format!("Opening {} session...", self.engine.name()),
        ));
        let mut session = SessionGuard::new(self.engine.open_session()?);

        let cells = document.cells();
        let total = cells.len();
        let mut executed = ExecutedDocument::new(document.title(), self.engine.executes());

        for (index, (path, cell)) in cells.into_iter().enumerate() {
            self.check_cancelled()?;
            let section = path.to_string();

            if !cell.is_code() {
                executed.push(section, cell.clone(), CellResult::Success(CellOutput::empty()));
                continue;
            }

            debug!(index, section = %section, "Executing cell");
            self.report_progress(ProgressUpdate::cell(
                section.clone(),
                index,
                total,
                format!("Executing cell {} of {} ({})", index + 1, total, section),
            ));

            match session.run_cell(index, cell) {
                Ok(output) => {
                    executed.push(section, cell.clone(), CellResult::Success(output));
                }
                Err(CellFailure::Session(message)) => {
                    error!(index, section = %section, "Execution session failed: {}", message);
                    return Err(ExportError::Session(format!(
                        "cell {} in '{}': {}",
                        index, section, message
                    )));
                }
                Err(CellFailure::Raised {
                    ename,
                    evalue,
                    traceback,
                }) => {
                    let failure = CellExecutionError {
                        cell_index: index,
                        section: section.clone(),
                        ename,
                        evalue,
                        traceback,
                    };
                    warn!("{}", failure);
                    executed.push(section, cell.clone(), CellResult::Failure(failure.clone()));
                    if policy == ExecutionPolicy::FailFast {
                        return Err(ExportError::Execution {
                            partial: Box::new(executed),
                            error: failure,
                        });
                    }
                }
            }
        }

        self.report_progress(ProgressUpdate::cell(
            "report",
            total,
            total,
            "All cells executed",
        ));
        info!(
            cells = total,
            failures = executed.failures().count(),
            "Execution finished in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
        Ok(executed)
    }

    /// Render an executed document with the renderer registered for `format`.
    pub fn render(&self, executed: &ExecutedDocument, format: TargetFormat) -> Result<Artifact> {
        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(
            ExportStage::Rendering,
            0.0,
            format!("Rendering {}...", format),
        ));

        let bytes = match self.renderers.get(&format) {
            Some(renderer) => renderer.render(executed)?,
            None => renderer_for(format).render(executed)?,
        };
        let manifest = Manifest::from_executed(format, self.engine.name(), executed);
        debug!(%format, bytes = bytes.len(), "Rendered artifact");

        Ok(Artifact {
            format,
            bytes,
            manifest,
        })
    }

    fn finish(&self, result: Result<Artifact>) -> Result<Artifact> {
        match result {
            Ok(artifact) => {
                let message = match artifact.manifest.status {
                    ExportStatus::Success => "Export completed successfully".to_string(),
                    ExportStatus::PartialSuccess => format!(
                        "Export completed with {} failed cell(s)",
                        artifact.manifest.failures.len()
                    ),
                };
                self.report_progress(ProgressUpdate::complete(message));
                Ok(artifact)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Export error: {}", e);
                Err(e)
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(ExportError::Cancelled);
        }
        Ok(())
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

/// Builder for [`Exporter`].
#[derive(Default)]
pub struct ExporterBuilder {
    engine: Option<Arc<dyn ExecutionEngine>>,
    renderers: HashMap<TargetFormat, Arc<dyn Renderer>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

static_assertions::assert_impl_all!(ExporterBuilder: Send);

impl ExporterBuilder {
    /// Set the execution engine. Defaults to [`DryRunEngine`].
    pub fn engine(mut self, engine: Arc<dyn ExecutionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replace the built-in renderer for the renderer's format.
    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderers.insert(renderer.format(), renderer);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set a cancellation token; it is checked between cells.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn build(self) -> Exporter {
        Exporter {
            engine: self.engine.unwrap_or_else(|| Arc::new(DryRunEngine)),
            renderers: self.renderers,
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        }
    }
}
