//! Report assembly.
//!
//! A [`Report`] owns the dataset handle, the report-wide configuration and
//! the ordered top-level sections. [`Report::generate`] turns it into a
//! [`Document`]: every configuration error in the tree is collected, and on
//! success the cells are flattened in pre-order behind a single import
//! preamble and the data-loading setup cell.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_eda::{Report, ReportConfig, section::{Section, Overview, bivariate_analysis}};
//!
//! let mut report = Report::new(df, ReportConfig::default())?;
//! report
//!     .add_section(Section::leaf(Overview))
//!     .add_section(bivariate_analysis());
//! let document = report.generate()?;
//! ```

mod document;

pub use document::{Document, DocumentCell};

use crate::cell::{Cell, merge_imports, preamble_cell};
use crate::config::{COMMON_KEYS, ConfigKey, ConfigResolver, ReportConfig};
use crate::dataset::DatasetHandle;
use crate::error::ReportBuildError;
use crate::section::{
    IMPORT_PANDAS, MissingValues, Overview, Scope, Section, SectionPath, Univariate,
    bivariate_analysis, check_columns_exist, multivariate_analysis,
};
use polars::prelude::*;
use tracing::{debug, info, warn};

/// An EDA report: dataset, settings and the section tree.
#[derive(Debug)]
pub struct Report {
    config: ReportConfig,
    dataset: DatasetHandle,
    sections: Vec<Section>,
}

static_assertions::assert_impl_all!(Report: Send);

impl Report {
    /// Create an empty report over a DataFrame.
    pub fn new(df: DataFrame, config: ReportConfig) -> PolarsResult<Self> {
        Ok(Self::from_dataset(DatasetHandle::new(df)?, config))
    }

    /// Create an empty report over an existing dataset handle.
    pub fn from_dataset(dataset: DatasetHandle, config: ReportConfig) -> Self {
        Self {
            config,
            dataset,
            sections: Vec::new(),
        }
    }

    /// Report with the standard section set: overview, univariate,
    /// missing values, bivariate and multivariate analysis.
    pub fn default_sections(dataset: DatasetHandle, config: ReportConfig) -> Self {
        let mut report = Self::from_dataset(dataset, config);
        report
            .add_section(Section::leaf(Overview))
            .add_section(Section::leaf(Univariate))
            .add_section(Section::leaf(MissingValues))
            .add_section(bivariate_analysis())
            .add_section(multivariate_analysis());
        report
    }

    /// Append a top-level section. Validation happens in [`generate`](Self::generate).
    pub fn add_section(&mut self, section: Section) -> &mut Self {
        self.sections.push(section);
        self
    }

    /// Builder-style [`add_section`](Self::add_section).
    pub fn with_section(mut self, section: Section) -> Self {
        self.sections.push(section);
        self
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    pub fn dataset(&self) -> &DatasetHandle {
        &self.dataset
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// Union of the keys understood by any section of the report.
    pub fn known_keys(&self) -> Vec<ConfigKey> {
        let mut keys = COMMON_KEYS.to_vec();
        for section in &self.sections {
            for key in section.known_keys() {
                if !keys.iter().any(|k| k.name == key.name) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Generate the notebook document.
    ///
    /// Deterministic: the same report over the same dataset always yields an
    /// identical document. Every configuration error in the tree is reported
    /// in one [`ReportBuildError`].
    pub fn generate(&self) -> Result<Document, ReportBuildError> {
        info!(
            title = %self.config.title,
            sections = self.sections.len(),
            verbosity = %self.config.verbosity,
            "Generating report"
        );

        let root = SectionPath::root();
        let global = ConfigResolver::new(&self.known_keys())
            .resolve(&root, &self.config.global_map(), &Default::default())
            .map_err(|e| ReportBuildError { errors: vec![e] })?;

        let scope = Scope {
            dataset: &self.dataset,
            verbosity: self.config.verbosity,
            config: global,
            path: root,
        };

        let mut body = Vec::new();
        let mut errors = Vec::new();
        if let Err(e) = check_columns_exist(&self.dataset, &scope.path, &scope.config) {
            errors.push(e);
        }
        for section in &self.sections {
            section.generate(&scope, &mut body, &mut errors);
        }

        if !errors.is_empty() {
            for error in &errors {
                warn!(section = %error.section, "{}", error.kind);
            }
            return Err(ReportBuildError { errors });
        }

        let setup = vec![self.setup_cell()];
        let imports = merge_imports(setup.iter().chain(body.iter().map(|entry| &entry.cell)));
        debug!(imports = imports.len(), "Merged imports");
        let preamble = preamble_cell(&imports);

        let document = Document::new(self.config.title.clone(), preamble, setup, body);
        info!(cells = document.cell_count(), "Report generated");
        Ok(document)
    }

    fn setup_cell(&self) -> Cell {
        let name = &self.config.dataset_name;
        let code = match &self.config.load_code {
            Some(code) => code.clone(),
            None => format!(
                "# Load the dataset into `{name}` before running the analysis, for example:\n\
                 # {name} = pd.read_csv('data.csv')"
            ),
        };
        Cell::code(code).with_imports([IMPORT_PANDAS])
    }
}
