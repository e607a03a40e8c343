//! Correlation analysis of numeric columns.

use super::{
    Analysis, ColumnFilter, GenerationContext, IMPORT_PANDAS, KEY_COLUMNS_X, KEY_COLUMNS_Y,
    helper_import,
};
use crate::cell::Cell;
use crate::config::{ConfigKey, KEY_COLUMNS, ValueKind, Verbosity};
use crate::error::{ConfigErrorKind, ConfigurationError};
use crate::utils::{dedent, py_call, py_list, py_str};

const KEY_METHODS: &str = "methods";

pub const CORRELATION_METHODS: &[&str] = &["pearson", "spearman", "kendall"];

const KEYS: &[ConfigKey] = &[
    ConfigKey::new(KEY_METHODS, ValueKind::List),
    ConfigKey::new(KEY_COLUMNS_X, ValueKind::List),
    ConfigKey::new(KEY_COLUMNS_Y, ValueKind::List),
];

const HELPERS: &str = r#"
    def correlation_matrix(frame, method, columns_x=None, columns_y=None):
        matrix = frame.select_dtypes('number').corr(method=method)
        if columns_x is not None:
            matrix = matrix.loc[columns_x, columns_y]
        return matrix.round(2)
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct Correlation;

/// Which columns are correlated with which.
enum Selection {
    Columns(Vec<String>),
    Cartesian(Vec<String>, Vec<String>),
}

impl Correlation {
    fn methods(ctx: &GenerationContext<'_>) -> Result<Vec<String>, ConfigurationError> {
        let Some(requested) = ctx.config.get_list(KEY_METHODS) else {
            return Ok(CORRELATION_METHODS.iter().map(|m| m.to_string()).collect());
        };
        if requested.is_empty() {
            return Err(ctx.error(ConfigErrorKind::InvalidValue {
                key: KEY_METHODS.to_string(),
                expected: "a non-empty list".to_string(),
                found: "[]".to_string(),
            }));
        }
        for method in requested {
            if !CORRELATION_METHODS.contains(&method.as_str()) {
                return Err(ctx.error(ConfigErrorKind::InvalidValue {
                    key: KEY_METHODS.to_string(),
                    expected: format!("one of {}", CORRELATION_METHODS.join(", ")),
                    found: method.clone(),
                }));
            }
        }
        Ok(requested.to_vec())
    }

    fn selection(ctx: &GenerationContext<'_>) -> Result<Option<Selection>, ConfigurationError> {
        if let Some((x, y)) = ctx.select_xy(ColumnFilter::Numeric)? {
            if x.is_empty() || y.is_empty() {
                return Ok(None);
            }
            return Ok(Some(Selection::Cartesian(x, y)));
        }
        let columns = ctx.select_columns_min(ColumnFilter::Numeric, 2)?;
        if columns.is_empty() {
            return Ok(None);
        }
        Ok(Some(Selection::Columns(columns)))
    }

    fn title(method: &str) -> String {
        let mut chars = method.chars();
        match chars.next() {
            Some(first) => format!("{}{} Correlation", first.to_uppercase(), chars.as_str()),
            None => String::new(),
        }
    }
}

impl Analysis for Correlation {
    fn kind(&self) -> &'static str {
        "correlation"
    }

    fn default_name(&self) -> &'static str {
        "Correlation"
    }

    fn config_keys(&self) -> &'static [ConfigKey] {
        KEYS
    }

    fn generate_cells(&self, ctx: &GenerationContext<'_>) -> Result<Vec<Cell>, ConfigurationError> {
        let selection = Self::selection(ctx)?;
        let methods = Self::methods(ctx)?;
        let Some(selection) = selection else {
            return Ok(Vec::new());
        };

        // `columns_args` go to the summary call, `pair_args` to every per-method call.
        let (frame, count, columns_args, pair_args) = match &selection {
            Selection::Columns(columns) => {
                let mut columns_args = Vec::new();
                if ctx.has_column_subset() {
                    columns_args.push((KEY_COLUMNS, py_list(columns)));
                }
                (ctx.frame(columns), columns.len(), columns_args, Vec::new())
            }
            Selection::Cartesian(x, y) => {
                let mut distinct = x.clone();
                distinct.extend(y.iter().filter(|c| !x.contains(c)).cloned());
                let xy = vec![(KEY_COLUMNS_X, py_list(x)), (KEY_COLUMNS_Y, py_list(y))];
                (ctx.dataset_name().to_string(), distinct.len(), xy.clone(), xy)
            }
        };

        let mut cells = vec![ctx.heading()];

        if ctx.at_least(Verbosity::High) {
            cells.push(Cell::markdown(format!(
                "Correlation between {} numeric columns. Pearson measures linear dependence, \
                 Spearman and Kendall measure monotonic dependence on ranks.",
                count
            )));
            cells.push(Cell::code(dedent(HELPERS)).with_imports([IMPORT_PANDAS]));
        }

        let mut args = vec![("", ctx.dataset_name().to_string())];
        args.extend(columns_args);
        if ctx.config.contains(KEY_METHODS) {
            args.push((KEY_METHODS, py_list(&methods)));
        }
        cells.push(
            Cell::code(py_call("plot_correlations", &args))
                .with_imports([helper_import("plot_correlations")]),
        );

        if ctx.at_least(Verbosity::Medium) {
            for method in &methods {
                let mut args = vec![("", frame.clone()), ("method", py_str(method))];
                args.extend(pair_args.iter().cloned());

                cells.push(ctx.subheading(&Self::title(method)));
                cells.push(
                    Cell::code(py_call("plot_correlation", &args))
                        .with_imports([helper_import("plot_correlation")]),
                );
                if ctx.at_least(Verbosity::High) {
                    cells.push(Cell::code(py_call("correlation_matrix", &args)));
                }
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
    use crate::dataset::DatasetHandle;
    use polars::prelude::*;

    #[test]
    fn test_medium_one_cell_per_method() {
        let data = dataset();
        let config = ConfigMap::new().with(KEY_METHODS, vec!["spearman"]);
        let cells = cells_at(&Correlation, &data, Verbosity::Medium, &config).unwrap();
        let contents: Vec<&str> = cells.iter().map(|c| c.content()).collect();
        assert_eq!(
            contents,
            vec![
                "## Correlation",
                "plot_correlations(df, methods=['spearman'])",
                "### Spearman Correlation",
                "plot_correlation(df, method='spearman')",
            ]
        );
    }

    #[test]
    fn test_invalid_method_is_error() {
        let data = dataset();
        let config = ConfigMap::new().with(KEY_METHODS, vec!["cosine"]);
        assert!(cells_at(&Correlation, &data, Verbosity::Low, &config).is_err());
    }

    #[test]
    fn test_text_only_dataset_is_skipped_automatically() {
        let df = df! { "name" => &["a", "b"], "city" => &["x", "y"] }.unwrap();
        let data = DatasetHandle::new(df).unwrap();
        let cells = cells_at(&Correlation, &data, Verbosity::High, &ConfigMap::new()).unwrap();
        assert!(cells.is_empty());
    }

    #[test]
    fn test_explicit_text_column_is_error() {
        let df = df! { "name" => &["a", "b"], "city" => &["x", "y"] }.unwrap();
        let data = DatasetHandle::new(df).unwrap();
        let config = ConfigMap::new().with("columns", vec!["name"]);
        let err = cells_at(&Correlation, &data, Verbosity::Low, &config).unwrap_err();
        assert_eq!(err.section.name(), "Correlation");
        assert_eq!(err.columns(), ["name".to_string()]);
    }

    #[test]
    fn test_single_explicit_numeric_column_is_error() {
        let data = dataset();
        let config = ConfigMap::new().with("columns", vec!["fare"]);
        assert!(cells_at(&Correlation, &data, Verbosity::Low, &config).is_err());
    }

    #[test]
    fn test_empty_methods_is_error() {
        let data = dataset();
        let config = ConfigMap::new().with(KEY_METHODS, Vec::<String>::new());
        let err = cells_at(&Correlation, &data, Verbosity::Low, &config).unwrap_err();
        assert!(matches!(
            err.kind,
            ConfigErrorKind::InvalidValue { ref key, .. } if key == KEY_METHODS
        ));
    }

    #[test]
    fn test_columns_x_without_columns_y_is_error() {
        let data = dataset();
        let config = ConfigMap::new().with(KEY_COLUMNS_X, vec!["age"]);
        let err = cells_at(&Correlation, &data, Verbosity::Low, &config).unwrap_err();
        assert!(matches!(
            err.kind,
            ConfigErrorKind::MissingKey { ref key } if key == KEY_COLUMNS_Y
        ));
    }

    #[test]
    fn test_cartesian_columns_are_passed_through() {
        let data = dataset();
        let config = ConfigMap::new()
            .with(KEY_COLUMNS_X, vec!["age"])
            .with(KEY_COLUMNS_Y, vec!["fare", "sex"])
            .with(KEY_METHODS, vec!["pearson"]);
        let cells = cells_at(&Correlation, &data, Verbosity::High, &config).unwrap();
        let contents: Vec<&str> = cells.iter().map(|c| c.content()).collect();
        assert!(contents.contains(
            &"plot_correlations(df, columns_x=['age'], columns_y=['fare'], methods=['pearson'])"
        ));
        assert!(contents.contains(
            &"plot_correlation(df, method='pearson', columns_x=['age'], columns_y=['fare'])"
        ));
        assert!(contents.contains(
            &"correlation_matrix(df, method='pearson', columns_x=['age'], columns_y=['fare'])"
        ));
        assert!(contents[1].starts_with("Correlation between 2 numeric columns"));
    }

    #[test]
    fn test_cartesian_with_unknown_column_is_error() {
        let data = dataset();
        let config = ConfigMap::new()
            .with(KEY_COLUMNS_X, vec!["age"])
            .with(KEY_COLUMNS_Y, vec!["ghost"]);
        let err = cells_at(&Correlation, &data, Verbosity::Low, &config).unwrap_err();
        assert_eq!(err.columns(), ["ghost".to_string()]);
    }

    #[test]
    fn test_high_tabulates_each_method() {
        let data = dataset();
        let cells = cells_at(&Correlation, &data, Verbosity::High, &ConfigMap::new()).unwrap();
        let tables = cells
            .iter()
            .filter(|c| c.content().starts_with("correlation_matrix("))
            .count();
        assert_eq!(tables, CORRELATION_METHODS.len());
    }

    #[test]
    fn test_verbosity_superset() {
        let data = dataset();
        assert_superset(&Correlation, &data, &ConfigMap::new());
        let cartesian = ConfigMap::new()
            .with(KEY_COLUMNS_X, vec!["age"])
            .with(KEY_COLUMNS_Y, vec!["fare"]);
        assert_superset(&Correlation, &data, &cartesian);
    }
}
