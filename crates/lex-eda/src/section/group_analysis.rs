//! Statistics of every column split by one or more grouping columns.

use super::{Analysis, ColumnFilter, GenerationContext, IMPORT_PYPLOT, helper_import};
use crate::cell::Cell;
use crate::config::{ConfigKey, ValueKind, Verbosity};
use crate::error::{ConfigErrorKind, ConfigurationError};
use crate::utils::{DtypeCategory, md_code, md_escape, py_list, py_str};

const KEY_GROUPBY: &str = "groupby";

const KEYS: &[ConfigKey] = &[ConfigKey::new(KEY_GROUPBY, ValueKind::List)];

#[derive(Debug, Clone, Copy, Default)]
pub struct GroupAnalysis;

impl Analysis for GroupAnalysis {
    fn kind(&self) -> &'static str {
        "group_analysis"
    }

    fn default_name(&self) -> &'static str {
        "Group Analysis"
    }

    fn config_keys(&self) -> &'static [ConfigKey] {
        KEYS
    }

    fn generate_cells(&self, ctx: &GenerationContext<'_>) -> Result<Vec<Cell>, ConfigurationError> {
        let groupby = ctx.required_list(KEY_GROUPBY)?;
        if groupby.is_empty() {
            return Err(ctx.error(ConfigErrorKind::InvalidValue {
                key: KEY_GROUPBY.to_string(),
                expected: "at least one column".to_string(),
                found: "[]".to_string(),
            }));
        }
        let unknown: Vec<String> = groupby
            .iter()
            .filter(|c| !ctx.dataset.has_column(c))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(ctx.error(ConfigErrorKind::UnknownColumns { columns: unknown }));
        }

        let columns: Vec<String> = ctx
            .select_columns(ColumnFilter::Any)?
            .into_iter()
            .filter(|c| !groupby.contains(c))
            .collect();
        if columns.is_empty() {
            return Ok(Vec::new());
        }
        let by = py_list(groupby);

        let mut cells = vec![ctx.heading()];

        if ctx.at_least(Verbosity::High) {
            let keys: Vec<String> = groupby.iter().map(|g| md_code(g)).collect();
            cells.push(Cell::markdown(format!(
                "Each of the {} analysed columns is summarised per group of {}.",
                columns.len(),
                keys.join(", ")
            )));
        }

        cells.push(
            Cell::code(ctx.call("group_summary", &columns, vec![(KEY_GROUPBY, by.clone())]))
                .with_imports([helper_import("group_summary")]),
        );

        if ctx.at_least(Verbosity::Medium) {
            for column in &columns {
                cells.push(ctx.subheading(&md_escape(column)));
                cells.push(
                    Cell::code(format!(
                        "grouped_statistics({}, groupby={}, column={})",
                        ctx.dataset_name(),
                        by,
                        py_str(column)
                    ))
                    .with_imports([helper_import("grouped_statistics")]),
                );
                let numeric = ctx
                    .dataset
                    .column(column)
                    .is_some_and(|c| c.category == DtypeCategory::Numeric);
                if ctx.at_least(Verbosity::High) && numeric {
                    cells.push(
                        Cell::code(format!(
                            "overlaid_histograms({}, groupby={}, column={})\nplt.show()",
                            ctx.dataset_name(),
                            by,
                            py_str(column)
                        ))
                        .with_imports([
                            helper_import("overlaid_histograms"),
                            IMPORT_PYPLOT.to_string(),
                        ]),
                    );
                }
            }
        }

        Ok(cells)
    }
}
