//! Declarative report definitions.
//!
//! A [`ReportDefinition`] describes a report as JSON:
//!
//! ```json
//! {
//!   "title": "Titanic EDA",
//!   "verbosity": "medium",
//!   "config": { "n_top": 10, "color_col": "survived" },
//!   "sections": [
//!     { "kind": "overview" },
//!     { "kind": "correlation", "verbosity": "high", "config": { "methods": ["spearman"] } },
//!     { "kind": "group", "name": "Targeted", "children": [
//!       { "kind": "group_analysis", "config": { "groupby": ["sex"] } }
//!     ] }
//!   ]
//! }
//! ```
//!
//! `kind` is a leaf analysis (`overview`, `univariate`, ...), a built-in group
//! (`bivariate_analysis`, ...) or `group` for a custom group of `children`.

use crate::config::{
    ConfigMap, ConfigValidationError, ConfigValue, KEY_DATASET_NAME, KEY_N_TOP, KEY_RANDOM_SEED,
    ReportConfig, Verbosity,
};
use crate::dataset::DatasetHandle;
use crate::error::{ConfigErrorKind, ConfigurationError, ReportBuildError};
use crate::report::Report;
use crate::section::{Section, SectionPath, analysis_for_kind, group_for_kind};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Kind name for a user-defined group.
pub const GROUP_KIND: &str = "group";

/// Errors that can occur while turning a definition into a [`Report`].
#[derive(Debug, thiserror::Error)]
pub enum DefinitionError {
    #[error("Invalid report definition: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read report definition: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigValidationError),

    #[error(transparent)]
    Build(#[from] ReportBuildError),
}

/// Top level of a report definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<Verbosity>,
    /// Global configuration inherited by every section.
    #[serde(default, skip_serializing_if = "ConfigMap::is_empty")]
    pub config: ConfigMap,
    #[serde(default)]
    pub sections: Vec<SectionDefinition>,
}

/// One node of the section tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionDefinition {
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verbosity: Option<Verbosity>,
    #[serde(default, skip_serializing_if = "ConfigMap::is_empty")]
    pub config: ConfigMap,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SectionDefinition>,
}

impl SectionDefinition {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            verbosity: None,
            config: ConfigMap::new(),
            children: Vec::new(),
        }
    }

    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }
}

impl ReportDefinition {
    pub fn from_json(json: &str) -> Result<Self, DefinitionError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DefinitionError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Build a report over `dataset`.
    ///
    /// Title, verbosity and global config from the definition override
    /// `base`. Every unknown section kind and mistyped global value is
    /// collected into one [`ReportBuildError`].
    pub fn into_report(
        self,
        dataset: DatasetHandle,
        base: ReportConfig,
    ) -> Result<Report, DefinitionError> {
        let mut errors = Vec::new();
        let config = self.report_config(base, &mut errors)?;

        let root = SectionPath::root();
        let sections: Vec<Section> = self
            .sections
            .into_iter()
            .filter_map(|def| build_section(def, &root, &mut errors))
            .collect();

        if !errors.is_empty() {
            return Err(ReportBuildError { errors }.into());
        }

        debug!(sections = sections.len(), "Built report from definition");
        let mut report = Report::from_dataset(dataset, config);
        for section in sections {
            report.add_section(section);
        }
        Ok(report)
    }

    fn report_config(
        &self,
        mut config: ReportConfig,
        errors: &mut Vec<ConfigurationError>,
    ) -> Result<ReportConfig, ConfigValidationError> {
        if let Some(title) = &self.title {
            config.title = title.clone();
        }
        if let Some(verbosity) = self.verbosity {
            config.verbosity = verbosity;
        }

        let mut extra = self.config.clone();
        let root = SectionPath::root();
        let invalid = |key: &str, expected: &str, found: &ConfigValue| {
            ConfigurationError::new(
                root.clone(),
                ConfigErrorKind::InvalidValue {
                    key: key.to_string(),
                    expected: expected.to_string(),
                    found: found.type_name().to_string(),
                },
            )
        };

        if let Some(value) = extra.remove(KEY_RANDOM_SEED) {
            match value {
                ConfigValue::Int(seed) if seed >= 0 => config.random_seed = seed as u64,
                other => errors.push(invalid(KEY_RANDOM_SEED, "non-negative int", &other)),
            }
        }
        if let Some(value) = extra.remove(KEY_N_TOP) {
            match value {
                ConfigValue::Int(n) if n >= 0 => config.n_top = n as usize,
                other => errors.push(invalid(KEY_N_TOP, "positive int", &other)),
            }
        }
        if let Some(value) = extra.remove(KEY_DATASET_NAME) {
            match value {
                ConfigValue::Str(name) => config.dataset_name = name,
                other => errors.push(invalid(KEY_DATASET_NAME, "string", &other)),
            }
        }
        for (key, value) in extra.iter() {
            config.extra.insert(key.clone(), value.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

fn build_section(
    def: SectionDefinition,
    parent: &SectionPath,
    errors: &mut Vec<ConfigurationError>,
) -> Option<Section> {
    let path = parent.child(def.display_name());

    let section = if def.kind == GROUP_KIND {
        Section::group(def.name.clone().unwrap_or_else(|| "Group".to_string()), Vec::new())
    } else if let Some(group) = group_for_kind(&def.kind) {
        group
    } else if let Some(analysis) = analysis_for_kind(&def.kind) {
        if !def.children.is_empty() {
            errors.push(ConfigurationError::new(
                path,
                ConfigErrorKind::InvalidValue {
                    key: "children".to_string(),
                    expected: "no children for a leaf section".to_string(),
                    found: format!("{} children", def.children.len()),
                },
            ));
            return None;
        }
        Section::from_analysis(analysis)
    } else {
        errors.push(ConfigurationError::new(
            path,
            ConfigErrorKind::UnknownSection { kind: def.kind },
        ));
        return None;
    };

    let mut section = match def.name {
        Some(name) => section.with_name(name),
        None => section,
    };
    if let Some(verbosity) = def.verbosity {
        section = section.with_verbosity(verbosity);
    }
    let path = parent.child(section.name());
    for child in def.children {
        if let Some(child) = build_section(child, &path, errors) {
            section = section.with_child(child);
        }
    }
    Some(section.with_config(def.config))
}
