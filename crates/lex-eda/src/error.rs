//! Error types for report generation and export.
//!
//! This module provides the error hierarchy using `thiserror`:
//!
//! - [`ConfigurationError`]: one bad configuration value for one section.
//! - [`ReportBuildError`]: every configuration error found by one
//!   [`Report::generate`](crate::Report::generate) call.
//! - [`CellExecutionError`]: a generated cell failed at execution time.
//! - [`RenderingError`]: the renderer could not produce an artifact.
//! - [`ExportError`]: the umbrella error returned by the export pipeline.
//!
//! Errors are serializable so that the CLI can emit them as JSON.

use crate::executed::ExecutedDocument;
use crate::section::SectionPath;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// What exactly is wrong with a section's configuration.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ConfigErrorKind {
    /// Keys that the section does not understand.
    #[error("unknown configuration keys: {}", .keys.join(", "))]
    UnknownKeys { keys: Vec<String> },

    /// A key has a value of the wrong type or out of range.
    #[error("invalid value for '{key}': expected {expected}, found {found}")]
    InvalidValue {
        key: String,
        expected: String,
        found: String,
    },

    /// A required key was not provided.
    #[error("missing required key '{key}'")]
    MissingKey { key: String },

    /// Requested columns do not exist in the dataset.
    #[error("columns not found in dataset: {}", .columns.join(", "))]
    UnknownColumns { columns: Vec<String> },

    /// Requested columns exist but none has the dtype the section needs.
    #[error("requested columns have no {required} column: {}", .columns.join(", "))]
    IncompatibleColumns {
        columns: Vec<String>,
        required: String,
    },

    /// A report definition named a section kind that does not exist.
    #[error("unknown section kind '{kind}'")]
    UnknownSection { kind: String },
}

/// A configuration problem attributed to one section.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("section '{section}': {kind}")]
pub struct ConfigurationError {
    pub section: SectionPath,
    pub kind: ConfigErrorKind,
}

impl ConfigurationError {
    pub fn new(section: SectionPath, kind: ConfigErrorKind) -> Self {
        Self { section, kind }
    }

    /// Columns named by this error, if any.
    pub fn columns(&self) -> &[String] {
        match &self.kind {
            ConfigErrorKind::UnknownColumns { columns }
            | ConfigErrorKind::IncompatibleColumns { columns, .. } => columns,
            _ => &[],
        }
    }
}

/// Aggregate of every configuration error found while generating a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportBuildError {
    pub errors: Vec<ConfigurationError>,
}

impl ReportBuildError {
    /// Names of every offending section, in traversal order.
    pub fn sections(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.section.to_string()).collect()
    }
}

impl std::fmt::Display for ReportBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "report has {} configuration error(s)",
            self.errors.len()
        )?;
        for error in &self.errors {
            write!(f, "\n  - {}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ReportBuildError {}

/// Runtime failure of one generated cell.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("cell {cell_index} ({section}) raised {ename}: {evalue}")]
pub struct CellExecutionError {
    /// Position of the cell in the document.
    pub cell_index: usize,
    /// Section that generated the cell, or the document setup.
    pub section: String,
    /// Error type name reported by the interpreter.
    pub ename: String,
    /// Error message reported by the interpreter.
    pub evalue: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traceback: Vec<String>,
}

/// The renderer could not produce the artifact.
#[derive(Error, Debug)]
pub enum RenderingError {
    #[error("no renderer registered for format '{0}'")]
    UnsupportedFormat(String),

    #[error("failed to serialize document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("rendering failed: {0}")]
    Failed(String),
}

/// The main error type for the export pipeline.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Export was cancelled between cells.
    #[error("Export cancelled")]
    Cancelled,

    /// The report could not be generated.
    #[error(transparent)]
    Build(#[from] ReportBuildError),

    /// A cell failed under the fail-fast policy.
    ///
    /// `partial` holds every cell that ran, ending with the failing one.
    #[error("Execution stopped: {error}")]
    Execution {
        partial: Box<ExecutedDocument>,
        error: CellExecutionError,
    },

    /// The execution engine could not start or talk to its session.
    #[error("Execution session error: {0}")]
    Session(String),

    /// Rendering failed; no artifact was produced.
    #[error("Rendering failed: {0}")]
    Rendering(#[from] RenderingError),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),
}

impl ExportError {
    /// Get error code for programmatic handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::Build(_) => "REPORT_BUILD_FAILED",
            Self::Execution { .. } => "CELL_EXECUTION_FAILED",
            Self::Session(_) => "SESSION_ERROR",
            Self::Rendering(_) => "RENDERING_FAILED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if the caller can fix the problem and retry with the same data.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::Build(_) | Self::Execution { .. }
        )
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ExportError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ExportError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn config_error(section: &str, column: &str) -> ConfigurationError {
        ConfigurationError::new(
            SectionPath::root().child(section),
            ConfigErrorKind::UnknownColumns {
                columns: vec![column.to_string()],
            },
        )
    }

    #[test]
    fn test_configuration_error_names_section_and_columns() {
        let error = config_error("Correlation", "price");
        let message = error.to_string();
        assert!(message.contains("Correlation"));
        assert!(message.contains("price"));
        assert_eq!(error.columns(), ["price".to_string()]);
    }

    #[test]
    fn test_report_build_error_lists_every_section() {
        let error = ReportBuildError {
            errors: vec![config_error("A", "x"), config_error("B", "y")],
        };
        let message = error.to_string();
        assert!(message.contains("2 configuration error(s)"));
        assert!(message.contains("'A'"));
        assert!(message.contains("'B'"));
        assert_eq!(error.sections(), vec!["A", "B"]);
    }

    #[test]
    fn test_error_code() {
        assert_eq!(ExportError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            ExportError::Session("boom".to_string()).error_code(),
            "SESSION_ERROR"
        );
        let build = ExportError::from(ReportBuildError { errors: vec![] });
        assert_eq!(build.error_code(), "REPORT_BUILD_FAILED");
    }

    #[test]
    fn test_is_recoverable() {
        assert!(ExportError::Cancelled.is_recoverable());
        assert!(ExportError::Cancelled.is_cancelled());
        assert!(
            !ExportError::Rendering(RenderingError::Failed("x".to_string())).is_recoverable()
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = ExportError::Session("kernel died".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("SESSION_ERROR"));
        assert!(json.contains("kernel died"));
    }

    #[test]
    fn test_unknown_section_serialization() {
        let error = ConfigurationError::new(
            SectionPath::root().child("Extras").child("sankey"),
            ConfigErrorKind::UnknownSection {
                kind: "sankey".to_string(),
            },
        );
        let json = serde_json::to_value(&error).unwrap();
        assert_eq!(json["section"], "Extras / sankey");
        assert_eq!(json["kind"]["error"], "unknown_section");
        assert_eq!(json["kind"]["kind"], "sankey");
    }

    #[test]
    fn test_cell_execution_error_message() {
        let error = CellExecutionError {
            cell_index: 4,
            section: "Correlation".to_string(),
            ename: "ValueError".to_string(),
            evalue: "could not convert".to_string(),
            traceback: vec![],
        };
        assert_eq!(
            error.to_string(),
            "cell 4 (Correlation) raised ValueError: could not convert"
        );
    }
}
