//! Contingency tables between categorical columns.

use super::{
    Analysis, ColumnFilter, GenerationContext, KEY_COLUMNS_X, KEY_COLUMNS_Y, helper_import,
};
use crate::cell::Cell;
use crate::config::{ConfigKey, KEY_COLUMNS, ValueKind, Verbosity};
use crate::error::ConfigurationError;
use crate::utils::{py_call, py_list, py_pairs, py_str};

use super::pair_plot::KEY_COLOR_COL;

const KEY_COLUMNS_PAIRS: &str = "columns_pairs";
const KEY_TABLE_THRESHOLD: &str = "table_threshold";

/// Most unique values a column may have to be tabulated.
pub const DEFAULT_TABLE_THRESHOLD: i64 = 30;

const KEYS: &[ConfigKey] = &[
    ConfigKey::new(KEY_COLOR_COL, ValueKind::Str),
    ConfigKey::new(KEY_COLUMNS_X, ValueKind::List),
    ConfigKey::new(KEY_COLUMNS_Y, ValueKind::List),
    ConfigKey::new(KEY_COLUMNS_PAIRS, ValueKind::Pairs),
    ConfigKey::new(KEY_TABLE_THRESHOLD, ValueKind::Int),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ContingencyTable;

impl ContingencyTable {
    /// Candidate pairs and the arguments that select them in the summary call.
    ///
    /// `columns_pairs` wins over `columns_x`/`columns_y`, which win over
    /// `columns`.
    fn candidates(
        ctx: &GenerationContext<'_>,
    ) -> Result<(Vec<(String, String)>, Vec<(&'static str, String)>), ConfigurationError> {
        if let Some(pairs) = ctx.config.get_pairs(KEY_COLUMNS_PAIRS) {
            ctx.require_existing(pairs.iter().flat_map(|(a, b)| [a, b]))?;
            let categorical = |name: &str| {
                ctx.dataset
                    .column(name)
                    .is_some_and(|c| ColumnFilter::Categorical.accepts(c.category))
            };
            let kept = pairs
                .iter()
                .filter(|(a, b)| categorical(a) && categorical(b))
                .cloned()
                .collect();
            return Ok((kept, vec![(KEY_COLUMNS_PAIRS, py_pairs(pairs))]));
        }

        if let Some((x, y)) = ctx.select_xy(ColumnFilter::Categorical)? {
            let pairs = x
                .iter()
                .flat_map(|a| y.iter().map(move |b| (a.clone(), b.clone())))
                .collect();
            let args = vec![(KEY_COLUMNS_X, py_list(&x)), (KEY_COLUMNS_Y, py_list(&y))];
            return Ok((pairs, args));
        }

        let columns = ctx.select_columns_min(ColumnFilter::Categorical, 2)?;
        let mut pairs = Vec::new();
        for (i, first) in columns.iter().enumerate() {
            for second in &columns[i + 1..] {
                pairs.push((first.clone(), second.clone()));
            }
        }
        let mut args = Vec::new();
        if ctx.has_column_subset() {
            args.push((KEY_COLUMNS, py_list(&columns)));
        }
        Ok((pairs, args))
    }

    /// Columns that are entirely null, or with more unique values than the
    /// threshold, are never tabulated. A non-positive threshold disables the
    /// unique-value limit.
    fn tabulable(ctx: &GenerationContext<'_>, name: &str, threshold: i64) -> bool {
        let Some(meta) = ctx.dataset.column(name) else {
            return false;
        };
        let all_null = meta.null_count >= ctx.dataset.height();
        let within = threshold <= 0 || meta.unique_count as i64 <= threshold;
        !all_null && within
    }
}

impl Analysis for ContingencyTable {
    fn kind(&self) -> &'static str {
        "contingency_table"
    }

    fn default_name(&self) -> &'static str {
        "Contingency Table"
    }

    fn config_keys(&self) -> &'static [ConfigKey] {
        KEYS
    }

    fn generate_cells(&self, ctx: &GenerationContext<'_>) -> Result<Vec<Cell>, ConfigurationError> {
        let (candidates, selection_args) = Self::candidates(ctx)?;
        let color_col = ctx.optional_column(KEY_COLOR_COL)?;
        let threshold = ctx
            .config
            .get_int(KEY_TABLE_THRESHOLD)
            .unwrap_or(DEFAULT_TABLE_THRESHOLD);

        let pairs: Vec<(String, String)> = candidates
            .into_iter()
            .filter(|(a, b)| {
                a != b && Self::tabulable(ctx, a, threshold) && Self::tabulable(ctx, b, threshold)
            })
            .collect();
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let mut cells = vec![ctx.heading()];

        if ctx.at_least(Verbosity::High) {
            cells.push(Cell::markdown(format!(
                "Cross-tabulated frequencies for {} pairs of categorical columns. \
                 Cells are coloured by count; sparse tables suggest weakly related columns.",
                pairs.len()
            )));
        }

        let mut args = vec![("", ctx.dataset_name().to_string())];
        args.extend(selection_args);
        if ctx.config.contains(KEY_TABLE_THRESHOLD) {
            args.push((KEY_TABLE_THRESHOLD, threshold.to_string()));
        }
        if let Some(color) = color_col {
            args.push((KEY_COLOR_COL, py_str(color)));
        }
        cells.push(
            Cell::code(py_call("contingency_tables", &args))
                .with_imports([helper_import("contingency_tables")]),
        );

        if ctx.at_least(Verbosity::Medium) {
            for (first, second) in &pairs {
                cells.push(
                    Cell::code(format!(
                        "contingency_table({}, {}, {})",
                        ctx.dataset_name(),
                        py_str(first),
                        py_str(second)
                    ))
                    .with_imports([helper_import("contingency_table")]),
                );
            }
        }

        Ok(cells)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::config::{ConfigMap, ConfigValue};
    use crate::dataset::DatasetHandle;
    use polars::prelude::*;

    #[test]
    fn test_medium_one_cell_per_pair() {
        let data = dataset();
        let cells = cells_at(&ContingencyTable, &data, Verbosity::Medium, &ConfigMap::new()).unwrap();
        let contents: Vec<&str> = cells.iter().map(|c| c.content()).collect();
        assert_eq!(
            contents,
            vec![
                "## Contingency Table",
                "contingency_tables(df)",
                "contingency_table(df, 'sex', 'class')",
            ]
        );
    }

    #[test]
    fn test_explicit_numeric_columns_are_error() {
        let data = dataset();
        let config = ConfigMap::new().with("columns", vec!["age", "fare"]);
        let err = cells_at(&ContingencyTable, &data, Verbosity::Low, &config).unwrap_err();
        assert!(err.to_string().contains("categorical"));
    }

    #[test]
    fn test_columns_pairs_are_tabulated_as_given() {
        let data = dataset();
        let config = ConfigMap::new().with(
            KEY_COLUMNS_PAIRS,
            ConfigValue::pairs([("class", "sex"), ("sex", "sex")]),
        );
        let cells = cells_at(&ContingencyTable, &data, Verbosity::Medium, &config).unwrap();
        let contents: Vec<&str> = cells.iter().map(|c| c.content()).collect();
        assert_eq!(
            contents,
            vec![
                "## Contingency Table",
                "contingency_tables(df, columns_pairs=[('class', 'sex'), ('sex', 'sex')])",
                "contingency_table(df, 'class', 'sex')",
            ]
        );
    }

    #[test]
    fn test_unknown_column_in_pairs_is_error() {
        let data = dataset();
        let config =
            ConfigMap::new().with(KEY_COLUMNS_PAIRS, ConfigValue::pairs([("sex", "ghost")]));
        let err = cells_at(&ContingencyTable, &data, Verbosity::Low, &config).unwrap_err();
        assert_eq!(err.columns(), ["ghost".to_string()]);
    }

    #[test]
    fn test_cartesian_product_of_x_and_y() {
        let data = dataset();
        let config = ConfigMap::new()
            .with(KEY_COLUMNS_X, vec!["sex", "class"])
            .with(KEY_COLUMNS_Y, vec!["class"]);
        let cells = cells_at(&ContingencyTable, &data, Verbosity::Medium, &config).unwrap();
        let contents: Vec<&str> = cells.iter().map(|c| c.content()).collect();
        assert_eq!(
            contents,
            vec![
                "## Contingency Table",
                "contingency_tables(df, columns_x=['sex', 'class'], columns_y=['class'])",
                "contingency_table(df, 'sex', 'class')",
            ]
        );
    }

    #[test]
    fn test_columns_x_alone_is_error() {
        let data = dataset();
        let config = ConfigMap::new().with(KEY_COLUMNS_X, vec!["sex"]);
        assert!(cells_at(&ContingencyTable, &data, Verbosity::Low, &config).is_err());
    }

    #[test]
    fn test_table_threshold_excludes_wide_columns() {
        let df = df! {
            "id" => &["a", "b", "c", "d"],
            "sex" => &["m", "f", "f", "m"],
            "class" => &["x", "y", "x", "y"],
        }
        .unwrap();
        let data = DatasetHandle::new(df).unwrap();

        let config = ConfigMap::new().with(KEY_TABLE_THRESHOLD, 3i64);
        let cells = cells_at(&ContingencyTable, &data, Verbosity::Medium, &config).unwrap();
        let tables: Vec<&str> = cells
            .iter()
            .map(|c| c.content())
            .filter(|c| c.starts_with("contingency_table("))
            .collect();
        assert_eq!(tables, vec!["contingency_table(df, 'sex', 'class')"]);
        assert_eq!(cells[1].content(), "contingency_tables(df, table_threshold=3)");

        let unlimited = ConfigMap::new().with(KEY_TABLE_THRESHOLD, 0i64);
        let cells = cells_at(&ContingencyTable, &data, Verbosity::Medium, &unlimited).unwrap();
        let tables = cells
            .iter()
            .filter(|c| c.content().starts_with("contingency_table("))
            .count();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_all_null_columns_are_skipped() {
        let df = df! {
            "sex" => &["m", "f", "f"],
            "empty" => &[None::<&str>, None, None],
        }
        .unwrap();
        let data = DatasetHandle::new(df).unwrap();
        let cells = cells_at(&ContingencyTable, &data, Verbosity::High, &ConfigMap::new()).unwrap();
        assert!(cells.is_empty());
    }

    #[test]
    fn test_verbosity_superset() {
        let data = dataset();
        assert_superset(&ContingencyTable, &data, &ConfigMap::new());
    }
}
