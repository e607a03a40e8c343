//! Execution results.
//!
//! An [`ExecutedDocument`] pairs every cell of a [`Document`](crate::Document)
//! with a [`CellResult`]. Markdown cells always carry an empty success.

use crate::cell::Cell;
use crate::error::CellExecutionError;
use serde::{Deserialize, Serialize};

/// An image produced by a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Figure {
    /// MIME type, e.g. `image/png`.
    pub mime_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl Figure {
    pub fn png(data: impl Into<String>) -> Self {
        Self {
            mime_type: "image/png".to_string(),
            data: data.into(),
        }
    }
}

/// Output captured from one successful cell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CellOutput {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stdout: String,
    /// `repr` of the value of the cell's last expression, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub figures: Vec<Figure>,
}

impl CellOutput {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.display.is_none() && self.figures.is_empty()
    }
}

/// Outcome of one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CellResult {
    Success(CellOutput),
    Failure(CellExecutionError),
}

impl CellResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn output(&self) -> Option<&CellOutput> {
        match self {
            Self::Success(output) => Some(output),
            Self::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&CellExecutionError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(error) => Some(error),
        }
    }
}

/// A cell together with its execution result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedCell {
    /// Section that produced the cell.
    pub section: String,
    pub cell: Cell,
    pub result: CellResult,
}

/// A document after execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedDocument {
    pub title: String,
    /// False when the cells were recorded without running them.
    pub executed: bool,
    pub cells: Vec<ExecutedCell>,
}

impl ExecutedDocument {
    pub fn new(title: impl Into<String>, executed: bool) -> Self {
        Self {
            title: title.into(),
            executed,
            cells: Vec::new(),
        }
    }

    pub fn push(&mut self, section: impl Into<String>, cell: Cell, result: CellResult) {
        self.cells.push(ExecutedCell {
            section: section.into(),
            cell,
            result,
        });
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Every recorded cell failure, in document order.
    pub fn failures(&self) -> impl Iterator<Item = &CellExecutionError> {
        self.cells.iter().filter_map(|c| c.result.error())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}
