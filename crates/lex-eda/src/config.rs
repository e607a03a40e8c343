//! Configuration types for report generation.
//!
//! Two layers of configuration exist:
//!
//! - [`ReportConfig`]: typed, report-wide settings built with a fluent
//!   builder and validated up front (title, default verbosity, seed, ...).
//! - [`ConfigMap`]: dynamic per-section settings. Each section declares the
//!   keys it understands as a list of [`ConfigKey`]s, and [`ConfigResolver`]
//!   merges a section's local map over the global one.

use crate::error::{ConfigErrorKind, ConfigurationError};
use crate::section::SectionPath;
use crate::utils::is_python_identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

// =============================================================================
// Verbosity
// =============================================================================

/// How much a section emits.
///
/// Every level emits a superset of the cells of the level below it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// One aggregate call per section.
    #[default]
    Low,
    /// Adds per-column breakdown cells.
    Medium,
    /// Adds every diagnostic, narrative and helper definition cell.
    High,
}

impl Verbosity {
    pub const ALL: [Verbosity; 3] = [Verbosity::Low, Verbosity::Medium, Verbosity::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Verbosity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" | "0" => Ok(Self::Low),
            "medium" | "1" => Ok(Self::Medium),
            "high" | "2" => Ok(Self::High),
            _ => Err(format!(
                "Unknown verbosity '{s}'. Expected: low, medium, high"
            )),
        }
    }
}

// =============================================================================
// Dynamic configuration values
// =============================================================================

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
    /// Column pairs, written as `[["a", "b"], ...]`.
    Pairs(Vec<(String, String)>),
}

impl ConfigValue {
    /// Name of the value's type, used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Pairs(_) => "list of pairs",
        }
    }

    pub fn pairs<A: Into<String>, B: Into<String>>(pairs: impl IntoIterator<Item = (A, B)>) -> Self {
        Self::Pairs(pairs.into_iter().map(|(a, b)| (a.into(), b.into())).collect())
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl<S: Into<String>> From<Vec<S>> for ConfigValue {
    fn from(v: Vec<S>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Ordered map of configuration values.
///
/// Backed by a `BTreeMap` so iteration order, and therefore generated code,
/// is deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap(BTreeMap<String, ConfigValue>);

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(ConfigValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(ConfigValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    /// Floats accept integer values as well.
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.0.get(key) {
            Some(ConfigValue::Float(v)) => Some(*v),
            Some(ConfigValue::Int(v)) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(ConfigValue::Str(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn get_list(&self, key: &str) -> Option<&[String]> {
        match self.0.get(key) {
            Some(ConfigValue::List(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// An empty JSON list parses as a plain list and counts as no pairs.
    pub fn get_pairs(&self, key: &str) -> Option<&[(String, String)]> {
        match self.0.get(key) {
            Some(ConfigValue::Pairs(v)) => Some(v.as_slice()),
            Some(ConfigValue::List(v)) if v.is_empty() => Some(&[]),
            _ => None,
        }
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

// =============================================================================
// Key schema
// =============================================================================

/// Expected type of a configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    Int,
    Float,
    Str,
    List,
    Pairs,
}

impl ValueKind {
    fn accepts(&self, value: &ConfigValue) -> bool {
        match (self, value) {
            (Self::Bool, ConfigValue::Bool(_))
            | (Self::Int, ConfigValue::Int(_))
            | (Self::Float, ConfigValue::Float(_) | ConfigValue::Int(_))
            | (Self::Str, ConfigValue::Str(_))
            | (Self::List, ConfigValue::List(_))
            | (Self::Pairs, ConfigValue::Pairs(_)) => true,
            (Self::Pairs, ConfigValue::List(items)) => items.is_empty(),
            _ => false,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "string",
            Self::List => "list",
            Self::Pairs => "list of pairs",
        }
    }
}

/// A configuration key a section understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigKey {
    pub name: &'static str,
    pub kind: ValueKind,
}

impl ConfigKey {
    pub const fn new(name: &'static str, kind: ValueKind) -> Self {
        Self { name, kind }
    }
}

/// Subset of columns to analyse.
pub const KEY_COLUMNS: &str = "columns";
/// Set to `false` to make a section emit nothing.
pub const KEY_ENABLED: &str = "enabled";
/// Seed for any sampling done during generation or by generated code.
pub const KEY_RANDOM_SEED: &str = "random_seed";
/// Number of most frequent values shown in frequency tables.
pub const KEY_N_TOP: &str = "n_top";
/// Notebook variable holding the dataset.
pub const KEY_DATASET_NAME: &str = "dataset_name";

/// Keys every section understands.
pub const COMMON_KEYS: &[ConfigKey] = &[
    ConfigKey::new(KEY_COLUMNS, ValueKind::List),
    ConfigKey::new(KEY_ENABLED, ValueKind::Bool),
    ConfigKey::new(KEY_RANDOM_SEED, ValueKind::Int),
    ConfigKey::new(KEY_N_TOP, ValueKind::Int),
    ConfigKey::new(KEY_DATASET_NAME, ValueKind::Str),
];

/// Keys that are meaningful per section but never inherited from a parent
/// scope. A column subset chosen for a whole report still cascades, but
/// `enabled = false` on a group only disables that group.
const NON_INHERITED_KEYS: &[&str] = &[KEY_ENABLED];

// =============================================================================
// Resolver
// =============================================================================

/// Merges a section's local configuration over the inherited one.
///
/// Merge policy:
/// - explicit local keys override inherited keys of the same name;
/// - unset local keys inherit the parent value, restricted to keys the
///   section understands;
/// - unknown local keys and mistyped values fail with a
///   [`ConfigurationError`] naming the section.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    known: Vec<ConfigKey>,
}

impl ConfigResolver {
    /// Resolver for a section understanding the common keys plus `extra`.
    pub fn new(extra: &[ConfigKey]) -> Self {
        let mut known = COMMON_KEYS.to_vec();
        for key in extra {
            if !known.iter().any(|k| k.name == key.name) {
                known.push(*key);
            }
        }
        Self { known }
    }

    pub fn known_keys(&self) -> &[ConfigKey] {
        &self.known
    }

    fn key(&self, name: &str) -> Option<&ConfigKey> {
        self.known.iter().find(|k| k.name == name)
    }

    /// Resolve the effective configuration for one section.
    pub fn resolve(
        &self,
        section_path: &SectionPath,
        local: &ConfigMap,
        global: &ConfigMap,
    ) -> Result<ConfigMap, ConfigurationError> {
        let unknown: Vec<String> = local
            .keys()
            .filter(|k| self.key(k).is_none())
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigurationError::new(
                section_path.clone(),
                ConfigErrorKind::UnknownKeys { keys: unknown },
            ));
        }

        let mut resolved = ConfigMap::new();
        for (name, value) in global.iter() {
            if NON_INHERITED_KEYS.contains(&name.as_str()) {
                continue;
            }
            if let Some(key) = self.key(name)
                && key.kind.accepts(value)
            {
                resolved.insert(name.clone(), value.clone());
            }
        }

        for (name, value) in local.iter() {
            // Unknown keys were rejected above.
            let Some(key) = self.key(name) else { continue };
            if !key.kind.accepts(value) {
                return Err(ConfigurationError::new(
                    section_path.clone(),
                    ConfigErrorKind::InvalidValue {
                        key: name.clone(),
                        expected: key.kind.name().to_string(),
                        found: value.type_name().to_string(),
                    },
                ));
            }
            resolved.insert(name.clone(), value.clone());
        }

        Self::validate_common(section_path, &resolved)?;
        Ok(resolved)
    }

    fn validate_common(path: &SectionPath, config: &ConfigMap) -> Result<(), ConfigurationError> {
        if let Some(n_top) = config.get_int(KEY_N_TOP)
            && n_top < 1
        {
            return Err(ConfigurationError::new(
                path.clone(),
                ConfigErrorKind::InvalidValue {
                    key: KEY_N_TOP.to_string(),
                    expected: "a positive integer".to_string(),
                    found: n_top.to_string(),
                },
            ));
        }
        if let Some(name) = config.get_str(KEY_DATASET_NAME)
            && !is_python_identifier(name)
        {
            return Err(ConfigurationError::new(
                path.clone(),
                ConfigErrorKind::InvalidValue {
                    key: KEY_DATASET_NAME.to_string(),
                    expected: "a valid identifier".to_string(),
                    found: name.to_string(),
                },
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Report-wide typed configuration
// =============================================================================

/// Report-wide settings.
///
/// Use [`ReportConfig::builder()`] to create a configuration with a fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use lex_eda::config::{ReportConfig, Verbosity};
///
/// let config = ReportConfig::builder()
///     .title("Titanic EDA")
///     .verbosity(Verbosity::Medium)
///     .random_seed(7)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Report title, rendered as the first heading.
    /// Default: "Exploratory Data Analysis Report"
    pub title: String,

    /// Verbosity for sections that do not set their own.
    /// Default: Low
    pub verbosity: Verbosity,

    /// Seed for sampling in generation and generated code.
    /// Default: 42
    pub random_seed: u64,

    /// Number of most frequent values shown in frequency tables.
    /// Default: 5
    pub n_top: usize,

    /// Notebook variable holding the dataset.
    /// Default: "df"
    pub dataset_name: String,

    /// Code that loads the dataset into `dataset_name` in the notebook.
    /// If None, a placeholder comment is emitted instead.
    /// Default: None
    pub load_code: Option<String>,

    /// Additional global keys inherited by every section that understands them
    /// (e.g. `color_col`).
    pub extra: ConfigMap,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "Exploratory Data Analysis Report".to_string(),
            verbosity: Verbosity::default(),
            random_seed: 42,
            n_top: 5,
            dataset_name: "df".to_string(),
            load_code: None,
            extra: ConfigMap::new(),
        }
    }
}

impl ReportConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.title.trim().is_empty() {
            return Err(ConfigValidationError::EmptyTitle);
        }
        if self.n_top == 0 {
            return Err(ConfigValidationError::InvalidNTop(self.n_top));
        }
        if !is_python_identifier(&self.dataset_name) {
            return Err(ConfigValidationError::InvalidDatasetName(
                self.dataset_name.clone(),
            ));
        }
        Ok(())
    }

    /// The global [`ConfigMap`] every top-level section inherits from.
    pub fn global_map(&self) -> ConfigMap {
        let mut map = self.extra.clone();
        map.insert(KEY_RANDOM_SEED, self.random_seed as i64);
        map.insert(KEY_N_TOP, self.n_top as i64);
        map.insert(KEY_DATASET_NAME, self.dataset_name.clone());
        map
    }
}

/// Errors that can occur during report configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Report title must not be empty")]
    EmptyTitle,

    #[error("Invalid n_top: {0} (must be at least 1)")]
    InvalidNTop(usize),

    #[error("Invalid dataset name '{0}' (must be a valid identifier)")]
    InvalidDatasetName(String),
}

/// Builder for [`ReportConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ReportConfigBuilder {
    title: Option<String>,
    verbosity: Option<Verbosity>,
    random_seed: Option<u64>,
    n_top: Option<usize>,
    dataset_name: Option<String>,
    load_code: Option<String>,
    extra: ConfigMap,
}

impl ReportConfigBuilder {
    /// Set the report title.
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Set the default verbosity for sections without their own.
    pub fn verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = Some(verbosity);
        self
    }

    /// Set the seed used for sampling.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Set the number of most frequent values shown in frequency tables.
    pub fn n_top(mut self, n: usize) -> Self {
        self.n_top = Some(n);
        self
    }

    /// Set the notebook variable that holds the dataset.
    pub fn dataset_name(mut self, name: impl Into<String>) -> Self {
        self.dataset_name = Some(name.into());
        self
    }

    /// Set the code that loads the dataset in the generated notebook.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let config = ReportConfig::builder()
    ///     .load_code("df = pd.read_csv('train.csv')")
    ///     .build()?;
    /// ```
    pub fn load_code(mut self, code: impl Into<String>) -> Self {
        self.load_code = Some(code.into());
        self
    }

    /// Add a global key inherited by sections that understand it.
    pub fn global(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.extra.insert(key, value);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ReportConfig` or an error if validation fails.
    pub fn build(self) -> Result<ReportConfig, ConfigValidationError> {
        let defaults = ReportConfig::default();
        let config = ReportConfig {
            title: self.title.unwrap_or(defaults.title),
            verbosity: self.verbosity.unwrap_or_default(),
            random_seed: self.random_seed.unwrap_or(defaults.random_seed),
            n_top: self.n_top.unwrap_or(defaults.n_top),
            dataset_name: self.dataset_name.unwrap_or(defaults.dataset_name),
            load_code: self.load_code,
            extra: self.extra,
        };

        config.validate()?;
        Ok(config)
    }
}
