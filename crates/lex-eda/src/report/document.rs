//! The generated, not yet executed, notebook document.

use crate::cell::Cell;
use crate::section::SectionPath;
use serde::Serialize;

/// A body cell together with the section that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentCell {
    pub section: SectionPath,
    pub cell: Cell,
}

impl DocumentCell {
    pub fn new(section: SectionPath, cell: Cell) -> Self {
        Self { section, cell }
    }
}

/// Ordered notebook document produced by [`Report::generate`](super::Report::generate).
///
/// Flattened order is: title heading, import preamble, setup cells, body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    title: String,
    header: Cell,
    preamble: Cell,
    setup: Vec<Cell>,
    body: Vec<DocumentCell>,
}

impl Document {
    pub(crate) fn new(title: String, preamble: Cell, setup: Vec<Cell>, body: Vec<DocumentCell>) -> Self {
        let header = Cell::heading(1, &title);
        Self {
            title,
            header,
            preamble,
            setup,
            body,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Single code cell holding every import, sorted.
    pub fn preamble(&self) -> &Cell {
        &self.preamble
    }

    /// Cells that load the dataset.
    pub fn setup(&self) -> &[Cell] {
        &self.setup
    }

    pub fn body(&self) -> &[DocumentCell] {
        &self.body
    }

    /// Total number of cells in flattened order.
    pub fn cell_count(&self) -> usize {
        2 + self.setup.len() + self.body.len()
    }

    /// Every cell in execution order with the section it belongs to. Header,
    /// preamble and setup cells belong to the report root.
    pub fn cells(&self) -> Vec<(SectionPath, &Cell)> {
        let root = SectionPath::root();
        let mut cells = Vec::with_capacity(self.cell_count());
        cells.push((root.clone(), &self.header));
        cells.push((root.clone(), &self.preamble));
        for cell in &self.setup {
            cells.push((root.clone(), cell));
        }
        for entry in &self.body {
            cells.push((entry.section.clone(), &entry.cell));
        }
        cells
    }

    /// Body cells belonging to one section or any of its descendants.
    pub fn section_cells<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Cell> + 'a {
        self.body
            .iter()
            .filter(move |entry| entry.section.segments().iter().any(|s| s == name))
            .map(|entry| &entry.cell)
    }
}
