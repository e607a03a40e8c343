//! Dataset overview: shape, dtypes, preview and basic quality checks.

use super::{
    Analysis, ColumnFilter, GenerationContext, IMPORT_DISPLAY, IMPORT_PANDAS, helper_import,
};
use crate::cell::Cell;
use crate::config::{ConfigKey, ValueKind, Verbosity};
use crate::error::{ConfigErrorKind, ConfigurationError};
use crate::utils::{DtypeCategory, count_with_percentage, dedent, md_code, py_list};

const KEY_CHECKS: &str = "checks";

/// Checks the overview can run, in emission order.
pub const OVERVIEW_CHECKS: &[&str] = &[
    "quick_info",
    "data_types",
    "data_preview",
    "missing_values",
    "constant_occurrence",
    "duplicate_rows",
];

const KEYS: &[ConfigKey] = &[ConfigKey::new(KEY_CHECKS, ValueKind::List)];

#[derive(Debug, Clone, Copy, Default)]
pub struct Overview;

impl Overview {
    fn checks(ctx: &GenerationContext<'_>) -> Result<Vec<&'static str>, ConfigurationError> {
        let Some(requested) = ctx.config.get_list(KEY_CHECKS) else {
            return Ok(OVERVIEW_CHECKS.to_vec());
        };
        if let Some(bad) = requested
            .iter()
            .find(|c| !OVERVIEW_CHECKS.contains(&c.as_str()))
        {
            return Err(ctx.error(ConfigErrorKind::InvalidValue {
                key: KEY_CHECKS.to_string(),
                expected: format!("one of {}", OVERVIEW_CHECKS.join(", ")),
                found: bad.clone(),
            }));
        }
        // Emission order follows OVERVIEW_CHECKS regardless of request order.
        Ok(OVERVIEW_CHECKS
            .iter()
            .copied()
            .filter(|c| requested.iter().any(|r| r == c))
            .collect())
    }

    fn check_title(check: &str) -> &'static str {
        match check {
            "quick_info" => "Quick Info",
            "data_types" => "Data Types",
            "data_preview" => "Data Preview",
            "missing_values" => "Missing Values",
            "constant_occurrence" => "Constant Occurrence",
            _ => "Duplicate Rows",
        }
    }

    fn narrative(ctx: &GenerationContext<'_>, columns: &[String]) -> String {
        let data = ctx.dataset;
        let metas: Vec<_> = columns.iter().filter_map(|c| data.column(c)).collect();
        let count = |category: DtypeCategory| metas.iter().filter(|m| m.category == category).count();
        let nulls: usize = metas.iter().map(|m| m.null_count).sum();
        let cells = data.height() * metas.len();

        let mut text = format!(
            "The dataset has **{}** rows and **{}** analysed columns: {} numeric, {} text, {} boolean and {} datetime.",
            data.height(),
            metas.len(),
            count(DtypeCategory::Numeric),
            count(DtypeCategory::String),
            count(DtypeCategory::Boolean),
            count(DtypeCategory::Datetime),
        );
        text.push_str(&format!(
            "\n\nMissing cells: {}. Duplicated rows: {}.",
            count_with_percentage(nulls, cells),
            count_with_percentage(data.duplicate_rows(), data.height()),
        ));
        let constant: Vec<String> = metas
            .iter()
            .filter(|m| m.unique_count <= 1)
            .map(|m| md_code(&m.name))
            .collect();
        if !constant.is_empty() {
            text.push_str(&format!("\n\nConstant columns: {}.", constant.join(", ")));
        }
        text
    }
}

impl Analysis for Overview {
    fn kind(&self) -> &'static str {
        "overview"
    }

    fn default_name(&self) -> &'static str {
        "Overview"
    }

    fn config_keys(&self) -> &'static [ConfigKey] {
        KEYS
    }

    fn generate_cells(&self, ctx: &GenerationContext<'_>) -> Result<Vec<Cell>, ConfigurationError> {
        let columns = ctx.select_columns(ColumnFilter::Any)?;
        let checks = Self::checks(ctx)?;
        if columns.is_empty() || checks.is_empty() {
            return Ok(Vec::new());
        }
        let frame = ctx.frame(&columns);

        let mut cells = vec![ctx.heading()];

        if ctx.at_least(Verbosity::High) {
            cells.push(Cell::markdown(Self::narrative(ctx, &columns)));
            cells.push(
                Cell::code(dedent(
                    r#"
                    def dtype_summary(frame):
                        counts = frame.dtypes.astype(str).value_counts()
                        return counts.rename_axis('dtype').to_frame('columns')
                    "#,
                ))
                .with_imports([IMPORT_PANDAS]),
            );
            cells.push(Cell::code(format!("dtype_summary({})", frame)));
        }

        let mut extra = Vec::new();
        if ctx.config.contains(KEY_CHECKS) {
            let names: Vec<String> = checks.iter().map(|c| c.to_string()).collect();
            extra.push((KEY_CHECKS, py_list(&names)));
        }
        cells.push(
            Cell::code(ctx.call("overview", &columns, extra))
                .with_imports([helper_import("overview")]),
        );

        if ctx.at_least(Verbosity::Medium) {
            for check in &checks {
                cells.push(ctx.subheading(Self::check_title(check)));
                let cell = match *check {
                    "data_preview" => Cell::code(format!("display({}.head({}))", frame, ctx.n_top()))
                        .with_imports([IMPORT_DISPLAY]),
                    other => Cell::code(format!("{}({})", other, frame))
                        .with_imports([helper_import(other)]),
                };
                cells.push(cell);
            }
        }

        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::ConfigMap;

    #[test]
    fn test_low_is_heading_and_one_call() {
        let data = dataset();
        let cells = cells_at(&Overview, &data, Verbosity::Low, &ConfigMap::new()).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[0].content(), "## Overview");
        assert_eq!(cells[1].content(), "overview(df)");
        assert!(
            cells[1]
                .required_imports()
                .contains("from lexeda.analysis import overview")
        );
    }

    #[test]
    fn test_medium_adds_one_cell_per_check() {
        let data = dataset();
        let config = ConfigMap::new().with(KEY_CHECKS, vec!["duplicate_rows", "quick_info"]);
        let cells = cells_at(&Overview, &data, Verbosity::Medium, &config).unwrap();
        let contents: Vec<&str> = cells.iter().map(|c| c.content()).collect();
        assert!(contents.contains(&"overview(df, checks=['quick_info', 'duplicate_rows'])"));
        let quick = contents.iter().position(|c| *c == "quick_info(df)").unwrap();
        let dup = contents.iter().position(|c| *c == "duplicate_rows(df)").unwrap();
        assert!(quick < dup);
        assert!(!contents.iter().any(|c| c.starts_with("data_types")));
    }

    #[test]
    fn test_unknown_check_is_error() {
        let data = dataset();
        let config = ConfigMap::new().with(KEY_CHECKS, vec!["vibes"]);
        let err = cells_at(&Overview, &data, Verbosity::Low, &config).unwrap_err();
        assert!(err.to_string().contains("vibes"));
    }

    #[test]
    fn test_high_narrative_reports_shape() {
        let data = dataset();
        let cells = cells_at(&Overview, &data, Verbosity::High, &ConfigMap::new()).unwrap();
        assert!(cells[1].content().contains("**5** rows and **4** analysed columns"));
    }

    #[test]
    fn test_verbosity_superset() {
        let data = dataset();
        assert_superset(&Overview, &data, &ConfigMap::new());
    }
}
