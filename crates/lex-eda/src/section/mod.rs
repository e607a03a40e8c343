//! Report sections.
//!
//! A [`Section`] is either a leaf wrapping one [`Analysis`] or a group of
//! child sections sharing a verbosity and configuration scope. Generation
//! walks the tree in pre-order and passes the resolved scope down
//! explicitly; a section never looks at its parent or siblings.
//!
//! # Example
//!
//! ```rust,ignore
//! use lex_eda::section::{Section, Univariate, bivariate_analysis};
//! use lex_eda::config::{ConfigMap, Verbosity};
//!
//! let univariate = Section::leaf(Univariate)
//!     .with_verbosity(Verbosity::High)
//!     .with_config(ConfigMap::new().with("columns", vec!["age", "fare"]));
//! let bivariate = bivariate_analysis();
//! ```

mod autocorrelation;
mod contingency_table;
mod correlation;
mod group_analysis;
mod groups;
mod missing_values;
mod overview;
mod pair_plot;
mod umap;
mod univariate;

pub use autocorrelation::Autocorrelation;
pub use contingency_table::ContingencyTable;
pub use correlation::Correlation;
pub use group_analysis::GroupAnalysis;
pub use groups::{
    GROUP_KINDS, bivariate_analysis, group_analysis, group_for_kind, multivariate_analysis,
    timeseries_analysis,
};
pub use missing_values::MissingValues;
pub use overview::Overview;
pub use pair_plot::PairPlot;
pub use umap::Umap;
pub use univariate::Univariate;

use crate::cell::Cell;
use crate::config::{
    COMMON_KEYS, ConfigKey, ConfigMap, ConfigResolver, KEY_COLUMNS, KEY_DATASET_NAME, KEY_ENABLED,
    KEY_N_TOP, KEY_RANDOM_SEED, Verbosity,
};
use crate::dataset::DatasetHandle;
use crate::error::{ConfigErrorKind, ConfigurationError};
use crate::report::DocumentCell;
use crate::utils::{DtypeCategory, py_call, py_list, py_str};
use serde::Serialize;
use tracing::debug;

/// Python package providing the analysis helpers called by generated code.
pub const HELPER_MODULE: &str = "lexeda.analysis";

/// Import statement for one analysis helper.
pub fn helper_import(func: &str) -> String {
    format!("from {} import {}", HELPER_MODULE, func)
}

pub(crate) const IMPORT_PANDAS: &str = "import pandas as pd";
pub(crate) const IMPORT_NUMPY: &str = "import numpy as np";
pub(crate) const IMPORT_PYPLOT: &str = "import matplotlib.pyplot as plt";
pub(crate) const IMPORT_DISPLAY: &str = "from IPython.display import display";

/// Rows of a cartesian column request; must be given with [`KEY_COLUMNS_Y`].
pub const KEY_COLUMNS_X: &str = "columns_x";
/// Columns of a cartesian column request; must be given with [`KEY_COLUMNS_X`].
pub const KEY_COLUMNS_Y: &str = "columns_y";

// =============================================================================
// Section path
// =============================================================================

/// Position of a section in the report tree, as the chain of section names
/// from the top level down.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SectionPath(Vec<String>);

impl SectionPath {
    /// The report itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Nesting depth; top-level sections have depth 1.
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Name of the innermost section.
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("report")
    }
}

impl std::fmt::Display for SectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("report")
        } else {
            f.write_str(&self.0.join(" / "))
        }
    }
}

impl Serialize for SectionPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Generation context
// =============================================================================

/// Everything an analysis sees while generating its cells.
#[derive(Debug, Clone, Copy)]
pub struct GenerationContext<'a> {
    pub dataset: &'a DatasetHandle,
    pub verbosity: Verbosity,
    pub config: &'a ConfigMap,
    pub path: &'a SectionPath,
    /// `columns` was set on this section itself rather than inherited.
    pub explicit_columns: bool,
}

/// Column dtype a section works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnFilter {
    Any,
    Numeric,
    Categorical,
}

impl ColumnFilter {
    pub fn accepts(&self, category: DtypeCategory) -> bool {
        match self {
            Self::Any => true,
            Self::Numeric => category == DtypeCategory::Numeric,
            Self::Categorical => category.is_categorical(),
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Numeric => "numeric",
            Self::Categorical => "categorical",
        }
    }
}

impl<'a> GenerationContext<'a> {
    pub fn at_least(&self, level: Verbosity) -> bool {
        self.verbosity >= level
    }

    /// Notebook variable holding the dataset.
    pub fn dataset_name(&self) -> &str {
        self.config.get_str(KEY_DATASET_NAME).unwrap_or("df")
    }

    pub fn n_top(&self) -> usize {
        self.config
            .get_int(KEY_N_TOP)
            .map(|n| n.max(1) as usize)
            .unwrap_or(5)
    }

    pub fn random_seed(&self) -> u64 {
        self.config
            .get_int(KEY_RANDOM_SEED)
            .map(|s| s as u64)
            .unwrap_or(42)
    }

    /// Markdown heading level for this section; the report title is level 1.
    pub fn heading_level(&self) -> usize {
        self.path.depth() + 1
    }

    /// Heading cell for this section.
    pub fn heading(&self) -> Cell {
        Cell::heading(self.heading_level(), self.path.name())
    }

    /// Sub-heading one level below this section's heading.
    pub fn subheading(&self, title: &str) -> Cell {
        Cell::heading(self.heading_level() + 1, title)
    }

    /// A configuration error attributed to this section.
    pub fn error(&self, kind: ConfigErrorKind) -> ConfigurationError {
        ConfigurationError::new(self.path.clone(), kind)
    }

    /// Columns this section should analyse.
    ///
    /// With an explicit `columns` list, every name must exist and at least one
    /// must pass `filter`; names that exist but do not pass are dropped. An
    /// inherited list is only filtered. Without one, every dataset column
    /// passing `filter` is selected. Both of the latter may select nothing.
    pub fn select_columns(&self, filter: ColumnFilter) -> Result<Vec<String>, ConfigurationError> {
        let Some(requested) = self.config.get_list(KEY_COLUMNS) else {
            return Ok(self
                .dataset
                .columns()
                .iter()
                .filter(|c| filter.accepts(c.category))
                .map(|c| c.name.clone())
                .collect());
        };

        if !self.explicit_columns {
            return Ok(requested
                .iter()
                .filter(|name| {
                    self.dataset
                        .column(name)
                        .is_some_and(|c| filter.accepts(c.category))
                })
                .cloned()
                .collect());
        }

        self.require_existing(requested)?;

        let selected: Vec<String> = requested
            .iter()
            .filter(|name| {
                self.dataset
                    .column(name)
                    .is_some_and(|c| filter.accepts(c.category))
            })
            .cloned()
            .collect();

        if selected.is_empty() && !requested.is_empty() {
            return Err(self.error(ConfigErrorKind::IncompatibleColumns {
                columns: requested.to_vec(),
                required: filter.describe().to_string(),
            }));
        }
        if selected.len() < requested.len() {
            debug!(
                section = %self.path,
                dropped = requested.len() - selected.len(),
                "Dropping requested columns without a {} dtype",
                filter.describe()
            );
        }
        Ok(selected)
    }

    /// Like [`select_columns`](Self::select_columns) for analyses that relate
    /// columns to each other and need at least `min` of them.
    ///
    /// Too few columns under automatic selection yields an empty selection.
    pub fn select_columns_min(
        &self,
        filter: ColumnFilter,
        min: usize,
    ) -> Result<Vec<String>, ConfigurationError> {
        let selected = self.select_columns(filter)?;
        if selected.len() >= min {
            return Ok(selected);
        }
        match self.config.get_list(KEY_COLUMNS) {
            Some(requested) if self.explicit_columns && !requested.is_empty() => {
                Err(self.error(ConfigErrorKind::IncompatibleColumns {
                    columns: requested.to_vec(),
                    required: format!("at least {} {}", min, filter.describe()),
                }))
            }
            _ => Ok(Vec::new()),
        }
    }

    /// The `columns_x` by `columns_y` request, if any.
    ///
    /// Both keys must be given together and every name must exist. Names
    /// without a dtype passing `filter` are dropped, so either side may end
    /// up empty. A `columns_x`/`columns_y` request takes precedence over
    /// `columns`.
    pub fn select_xy(
        &self,
        filter: ColumnFilter,
    ) -> Result<Option<(Vec<String>, Vec<String>)>, ConfigurationError> {
        let (x, y) = match (
            self.config.get_list(KEY_COLUMNS_X),
            self.config.get_list(KEY_COLUMNS_Y),
        ) {
            (None, None) => return Ok(None),
            (Some(x), Some(y)) => (x, y),
            (Some(_), None) => {
                return Err(self.error(ConfigErrorKind::MissingKey {
                    key: KEY_COLUMNS_Y.to_string(),
                }));
            }
            (None, Some(_)) => {
                return Err(self.error(ConfigErrorKind::MissingKey {
                    key: KEY_COLUMNS_X.to_string(),
                }));
            }
        };
        self.require_existing(x.iter().chain(y))?;

        let keep = |names: &[String]| -> Vec<String> {
            names
                .iter()
                .filter(|name| {
                    self.dataset
                        .column(name)
                        .is_some_and(|c| filter.accepts(c.category))
                })
                .cloned()
                .collect()
        };
        Ok(Some((keep(x), keep(y))))
    }

    /// Every name must be a dataset column.
    pub fn require_existing<'n>(
        &self,
        names: impl IntoIterator<Item = &'n String>,
    ) -> Result<(), ConfigurationError> {
        let mut unknown: Vec<String> = Vec::new();
        for name in names {
            if !self.dataset.has_column(name) && !unknown.contains(name) {
                unknown.push(name.clone());
            }
        }
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(self.error(ConfigErrorKind::UnknownColumns { columns: unknown }))
        }
    }

    /// Whether the analysis is restricted to a column subset, set here or
    /// inherited.
    pub fn has_column_subset(&self) -> bool {
        self.config.contains(KEY_COLUMNS)
    }

    /// Expression for the analysed frame: the dataset, or a column subset of
    /// it when a `columns` list applies.
    pub fn frame(&self, columns: &[String]) -> String {
        if self.has_column_subset() {
            format!("{}[{}]", self.dataset_name(), py_list(columns))
        } else {
            self.dataset_name().to_string()
        }
    }

    /// Expression for one column of the dataset.
    pub fn column_expr(&self, column: &str) -> String {
        format!("{}[{}]", self.dataset_name(), py_str(column))
    }

    /// Call of an analysis helper on the dataset, passing `columns=` only
    /// when a `columns` list applies.
    pub fn call(&self, func: &str, columns: &[String], extra: Vec<(&str, String)>) -> String {
        let mut args = vec![("", self.dataset_name().to_string())];
        if self.has_column_subset() {
            args.push((KEY_COLUMNS, py_list(columns)));
        }
        args.extend(extra);
        py_call(func, &args)
    }

    /// Optional column named by a string key; it must exist in the dataset.
    pub fn optional_column(&self, key: &str) -> Result<Option<&'a str>, ConfigurationError> {
        match self.config.get_str(key) {
            Some(name) if !self.dataset.has_column(name) => {
                Err(self.error(ConfigErrorKind::UnknownColumns {
                    columns: vec![name.to_string()],
                }))
            }
            other => Ok(other),
        }
    }

    /// Look up a list key that must be present.
    pub fn required_list(&self, key: &str) -> Result<&'a [String], ConfigurationError> {
        self.config.get_list(key).ok_or_else(|| {
            self.error(ConfigErrorKind::MissingKey {
                key: key.to_string(),
            })
        })
    }
}

// =============================================================================
// Analysis trait
// =============================================================================

/// A leaf analysis that turns a dataset into notebook cells.
///
/// Implementations must emit, for a fixed dataset and configuration, a
/// superset of the Low cells at Medium and a superset of the Medium cells at
/// High.
pub trait Analysis: std::fmt::Debug + Send + Sync {
    /// Stable identifier used in report definitions (e.g. `"univariate"`).
    fn kind(&self) -> &'static str;

    /// Section name used when the caller does not give one.
    fn default_name(&self) -> &'static str;

    /// Keys this analysis understands in addition to [`COMMON_KEYS`].
    fn config_keys(&self) -> &'static [ConfigKey] {
        &[]
    }

    fn generate_cells(&self, ctx: &GenerationContext<'_>) -> Result<Vec<Cell>, ConfigurationError>;
}

/// Build a leaf analysis from its kind identifier.
pub fn analysis_for_kind(kind: &str) -> Option<Box<dyn Analysis>> {
    let analysis: Box<dyn Analysis> = match kind {
        "overview" => Box::new(Overview),
        "univariate" => Box::new(Univariate),
        "missing_values" => Box::new(MissingValues),
        "correlation" => Box::new(Correlation),
        "pair_plot" => Box::new(PairPlot),
        "contingency_table" => Box::new(ContingencyTable),
        "group_analysis" => Box::new(GroupAnalysis),
        "autocorrelation" => Box::new(Autocorrelation),
        "umap" => Box::new(Umap),
        _ => return None,
    };
    Some(analysis)
}

/// Every leaf kind understood by [`analysis_for_kind`].
pub const ANALYSIS_KINDS: &[&str] = &[
    "overview",
    "univariate",
    "missing_values",
    "correlation",
    "pair_plot",
    "contingency_table",
    "group_analysis",
    "autocorrelation",
    "umap",
];

// =============================================================================
// Section tree
// =============================================================================

/// Leaf or group.
#[derive(Debug)]
pub enum SectionKind {
    Leaf(Box<dyn Analysis>),
    Group(Vec<Section>),
}

/// A node of the report tree.
#[derive(Debug)]
pub struct Section {
    name: String,
    verbosity: Option<Verbosity>,
    config: ConfigMap,
    kind: SectionKind,
}

/// Resolved verbosity and configuration handed down from a parent.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    pub dataset: &'a DatasetHandle,
    pub verbosity: Verbosity,
    pub config: ConfigMap,
    pub path: SectionPath,
}

impl Section {
    pub fn leaf(analysis: impl Analysis + 'static) -> Self {
        Self::from_analysis(Box::new(analysis))
    }

    pub fn from_analysis(analysis: Box<dyn Analysis>) -> Self {
        Self {
            name: analysis.default_name().to_string(),
            verbosity: None,
            config: ConfigMap::new(),
            kind: SectionKind::Leaf(analysis),
        }
    }

    pub fn group(name: impl Into<String>, children: Vec<Section>) -> Self {
        Self {
            name: name.into(),
            verbosity: None,
            config: ConfigMap::new(),
            kind: SectionKind::Group(children),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = Some(verbosity);
        self
    }

    pub fn with_config(mut self, config: ConfigMap) -> Self {
        self.config = config;
        self
    }

    pub fn with_option(
        mut self,
        key: impl Into<String>,
        value: impl Into<crate::config::ConfigValue>,
    ) -> Self {
        self.config.insert(key, value);
        self
    }

    /// Append a child to a group. Leaves are returned unchanged.
    pub fn with_child(mut self, child: Section) -> Self {
        if let SectionKind::Group(children) = &mut self.kind {
            children.push(child);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn verbosity(&self) -> Option<Verbosity> {
        self.verbosity
    }

    pub fn config(&self) -> &ConfigMap {
        &self.config
    }

    pub fn kind(&self) -> &SectionKind {
        &self.kind
    }

    /// Every key understood by this section or, for a group, any descendant.
    pub fn known_keys(&self) -> Vec<ConfigKey> {
        let mut keys = COMMON_KEYS.to_vec();
        self.collect_keys(&mut keys);
        keys
    }

    fn collect_keys(&self, keys: &mut Vec<ConfigKey>) {
        match &self.kind {
            SectionKind::Leaf(analysis) => {
                for key in analysis.config_keys() {
                    if !keys.iter().any(|k| k.name == key.name) {
                        keys.push(*key);
                    }
                }
            }
            SectionKind::Group(children) => {
                for child in children {
                    child.collect_keys(keys);
                }
            }
        }
    }

    /// Generate this section's cells into `out` in pre-order.
    ///
    /// Configuration errors are pushed to `errors` and generation continues
    /// with the next sibling so that every problem in the tree is reported.
    /// Children of a group with a broken configuration are still visited
    /// under the parent's configuration, for their own errors only.
    pub fn generate(
        &self,
        parent: &Scope<'_>,
        out: &mut Vec<DocumentCell>,
        errors: &mut Vec<ConfigurationError>,
    ) {
        let path = parent.path.child(&self.name);
        let verbosity = self.verbosity.unwrap_or(parent.verbosity);
        let resolver = ConfigResolver::new(&self.known_keys());
        let config = match resolver.resolve(&path, &self.config, &parent.config) {
            Ok(config) => config,
            Err(e) => {
                errors.push(e);
                if let SectionKind::Group(children) = &self.kind {
                    let scope = Scope {
                        dataset: parent.dataset,
                        verbosity,
                        config: parent.config.clone(),
                        path,
                    };
                    let mut discarded = Vec::new();
                    for child in children {
                        child.generate(&scope, &mut discarded, errors);
                    }
                }
                return;
            }
        };

        if config.get_bool(KEY_ENABLED) == Some(false) {
            debug!(section = %path, "Section disabled");
            return;
        }

        let scope = Scope {
            dataset: parent.dataset,
            verbosity,
            config,
            path,
        };

        match &self.kind {
            SectionKind::Leaf(analysis) => {
                let ctx = GenerationContext {
                    dataset: scope.dataset,
                    verbosity: scope.verbosity,
                    config: &scope.config,
                    path: &scope.path,
                    explicit_columns: self.config.contains(KEY_COLUMNS),
                };
                match analysis.generate_cells(&ctx) {
                    Ok(cells) => {
                        debug!(
                            section = %scope.path,
                            kind = analysis.kind(),
                            verbosity = %scope.verbosity,
                            cells = cells.len(),
                            "Generated section"
                        );
                        out.extend(
                            cells
                                .into_iter()
                                .map(|cell| DocumentCell::new(scope.path.clone(), cell)),
                        );
                    }
                    Err(e) => errors.push(e),
                }
            }
            SectionKind::Group(children) => {
                if self.config.contains(KEY_COLUMNS)
                    && let Err(e) = check_columns_exist(scope.dataset, &scope.path, &scope.config)
                {
                    errors.push(e);
                }
                let level = scope.path.depth() + 1;
                out.push(DocumentCell::new(
                    scope.path.clone(),
                    Cell::heading(level, &self.name),
                ));
                for child in children {
                    child.generate(&scope, out, errors);
                }
            }
        }
    }
}

/// Every name in the `columns` list of `config` must exist in `dataset`.
///
/// Used where a column list is set for a whole subtree; the leaves below only
/// filter it by dtype.
pub fn check_columns_exist(
    dataset: &DatasetHandle,
    path: &SectionPath,
    config: &ConfigMap,
) -> Result<(), ConfigurationError> {
    let Some(requested) = config.get_list(KEY_COLUMNS) else {
        return Ok(());
    };
    let unknown: Vec<String> = requested
        .iter()
        .filter(|name| !dataset.has_column(name))
        .cloned()
        .collect();
    if unknown.is_empty() {
        Ok(())
    } else {
        Err(ConfigurationError::new(
            path.clone(),
            ConfigErrorKind::UnknownColumns { columns: unknown },
        ))
    }
}
