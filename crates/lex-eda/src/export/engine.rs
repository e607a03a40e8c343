//! Execution engines.
//!
//! An [`ExecutionEngine`] opens one [`ExecutionSession`] per export. The
//! session owns a single persistent interpreter state: cells run in order
//! and later cells see names bound by earlier ones.

use crate::cell::Cell;
use crate::error::ExportError;
use crate::executed::CellOutput;
use std::ops::{Deref, DerefMut};
use tracing::debug;

/// Why a cell did not produce output.
#[derive(Debug, Clone, PartialEq)]
pub enum CellFailure {
    /// The cell raised an error; the session is still usable.
    Raised {
        ename: String,
        evalue: String,
        traceback: Vec<String>,
    },
    /// The session itself broke (interpreter died, protocol error).
    Session(String),
}

impl CellFailure {
    pub fn raised(ename: impl Into<String>, evalue: impl Into<String>) -> Self {
        Self::Raised {
            ename: ename.into(),
            evalue: evalue.into(),
            traceback: Vec::new(),
        }
    }
}

/// Factory for execution sessions.
pub trait ExecutionEngine: Send + Sync {
    /// Short name used in logs and manifests.
    fn name(&self) -> &'static str;

    fn open_session(&self) -> Result<Box<dyn ExecutionSession>, ExportError>;

    /// Whether sessions actually run code. Renderers leave execution counts
    /// empty for documents that were not executed.
    fn executes(&self) -> bool {
        true
    }
}

/// One interpreter state, scoped to one export.
pub trait ExecutionSession {
    /// Run a code cell. `index` is the cell's position in the document.
    fn run_cell(&mut self, index: usize, cell: &Cell) -> Result<CellOutput, CellFailure>;

    /// Release the interpreter. Must be safe to call more than once.
    fn close(&mut self);
}

/// Closes the wrapped session when dropped, including on early return,
/// cancellation and panic unwind.
pub struct SessionGuard {
    session: Box<dyn ExecutionSession>,
}

impl SessionGuard {
    pub fn new(session: Box<dyn ExecutionSession>) -> Self {
        Self { session }
    }
}

impl Deref for SessionGuard {
    type Target = dyn ExecutionSession;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        debug!("Closing execution session");
        self.session.close();
    }
}

// =============================================================================
// Dry run
// =============================================================================

/// Engine that runs nothing: every code cell records an empty success.
///
/// Used to export notebooks without executing them.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunEngine;

impl ExecutionEngine for DryRunEngine {
    fn name(&self) -> &'static str {
        "dry-run"
    }

    fn executes(&self) -> bool {
        false
    }

    fn open_session(&self) -> Result<Box<dyn ExecutionSession>, ExportError> {
        Ok(Box::new(DryRunSession))
    }
}

struct DryRunSession;

impl ExecutionSession for DryRunSession {
    fn run_cell(&mut self, _index: usize, _cell: &Cell) -> Result<CellOutput, CellFailure> {
        Ok(CellOutput::empty())
    }

    fn close(&mut self) {}
}
