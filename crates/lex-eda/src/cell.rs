//! Notebook cell model.
//!
//! A [`Cell`] is the atomic unit a section emits: either executable code or
//! markdown narrative, together with the import statements the code needs.
//! Imports are never written into the cell body; the report collects them
//! with [`merge_imports`] and emits them once in the preamble.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Kind of notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellKind {
    /// Executable code, run in the shared interpreter session.
    Code,
    /// Markdown narrative, never executed.
    Markdown,
}

impl CellKind {
    /// nbformat `cell_type` name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Markdown => "markdown",
        }
    }
}

/// A single notebook cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    kind: CellKind,
    content: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    required_imports: BTreeSet<String>,
}

impl Cell {
    /// Create a code cell without import requirements.
    pub fn code(content: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Code,
            content: content.into(),
            required_imports: BTreeSet::new(),
        }
    }

    /// Create a markdown cell.
    pub fn markdown(content: impl Into<String>) -> Self {
        Self {
            kind: CellKind::Markdown,
            content: content.into(),
            required_imports: BTreeSet::new(),
        }
    }

    /// Create a markdown heading cell at the given level (1-6).
    pub fn heading(level: usize, title: &str) -> Self {
        let level = level.clamp(1, 6);
        Self::markdown(format!("{} {}", "#".repeat(level), title))
    }

    /// Attach import requirements to this cell.
    pub fn with_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_imports
            .extend(imports.into_iter().map(Into::into));
        self
    }

    pub fn kind(&self) -> CellKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn required_imports(&self) -> &BTreeSet<String> {
        &self.required_imports
    }

    pub fn is_code(&self) -> bool {
        self.kind == CellKind::Code
    }
}

/// Union of the import requirements of every cell.
///
/// The result does not depend on the order of `cells`; duplicates are
/// removed by exact string match.
pub fn merge_imports<'a, I>(cells: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a Cell>,
{
    cells
        .into_iter()
        .flat_map(|cell| cell.required_imports.iter().cloned())
        .collect()
}

/// Build the single preamble code cell from a merged import set.
///
/// Imports are emitted in sorted order, one statement per line.
pub fn preamble_cell(imports: &BTreeSet<String>) -> Cell {
    let body = imports
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("\n");
    Cell::code(body)
}
