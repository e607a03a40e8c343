//! Exploratory Data Analysis Report Library
//!
//! Composes EDA reports from a tree of analysis sections and exports them as
//! executed Jupyter notebooks, static HTML pages or plain Python scripts.
//!
//! # Overview
//!
//! - **Sections**: leaf analyses (overview, univariate, missing values,
//!   correlation, ...) and groups of sections sharing verbosity and config
//! - **Verbosity**: `Low`, `Medium` and `High`, each a superset of the
//!   previous one
//! - **Configuration**: report-wide defaults cascade to sections, which
//!   reject keys they do not understand
//! - **Export**: cells run in one interpreter session, failures are recorded
//!   per cell or stop the export, and the result is rendered to bytes
//! - **Progress Reporting**: real-time progress updates with cancellation
//!   support
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lex_eda::{ExecutionPolicy, Exporter, PythonEngine, Report, ReportConfig, TargetFormat};
//! use lex_eda::section::{Section, Overview, MissingValues, bivariate_analysis};
//! use std::sync::Arc;
//!
//! let config = ReportConfig::builder()
//!     .title("Titanic EDA")
//!     .load_code("df = pd.read_csv('titanic.csv')")
//!     .build()?;
//!
//! let mut report = Report::new(df, config)?;
//! report
//!     .add_section(Section::leaf(Overview))
//!     .add_section(Section::leaf(MissingValues))
//!     .add_section(bivariate_analysis());
//! let document = report.generate()?;
//!
//! let artifact = Exporter::builder()
//!     .engine(Arc::new(PythonEngine::new()))
//!     .build()
//!     .export_to(&document, TargetFormat::Notebook, ExecutionPolicy::ContinueOnError, "eda.ipynb")?;
//! println!("{:?}: {} failed cells", artifact.manifest.status, artifact.manifest.failures.len());
//! ```
//!
//! # Report Definitions
//!
//! Reports can also be described declaratively with a
//! [`ReportDefinition`](definition::ReportDefinition), see [`definition`].

pub mod cell;
pub mod config;
pub mod dataset;
pub mod definition;
pub mod error;
pub mod executed;
pub mod export;
pub mod report;
pub mod section;
pub mod utils;

// Re-exports for convenient access
pub use cell::{Cell, CellKind, merge_imports};
pub use config::{
    ConfigMap, ConfigResolver, ConfigValidationError, ConfigValue, ReportConfig,
    ReportConfigBuilder, Verbosity,
};
pub use dataset::{ColumnMeta, DatasetHandle};
pub use definition::{DefinitionError, ReportDefinition, SectionDefinition};
pub use error::{
    CellExecutionError, ConfigErrorKind, ConfigurationError, ExportError, RenderingError,
    ReportBuildError, Result as ExportResult,
};
pub use executed::{CellOutput, CellResult, ExecutedCell, ExecutedDocument, Figure};
pub use export::{
    Artifact, CancellationToken, CellFailure, ClosureProgressReporter, DryRunEngine,
    ExecutionEngine, ExecutionPolicy, ExecutionSession, ExportStage, ExportStatus, Exporter,
    ExporterBuilder, FailedCell, Manifest, ProgressReporter, ProgressUpdate, PythonEngine,
    Renderer, TargetFormat,
};
pub use report::{Document, DocumentCell, Report};
pub use section::{Analysis, GenerationContext, Section, SectionKind, SectionPath};
pub use utils::DtypeCategory;
