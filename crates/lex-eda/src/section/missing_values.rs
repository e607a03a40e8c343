//! Missing value analysis.

use super::{Analysis, ColumnFilter, GenerationContext, IMPORT_PYPLOT, helper_import};
use crate::cell::Cell;
use crate::config::Verbosity;
use crate::error::ConfigurationError;
use crate::utils::{count_with_percentage, md_code};

/// Text of the single cell emitted when the analysed columns are complete.
pub const NO_MISSING_VALUES: &str = "no missing values found";

#[derive(Debug, Clone, Copy, Default)]
pub struct MissingValues;

impl Analysis for MissingValues {
    fn kind(&self) -> &'static str {
        "missing_values"
    }

    fn default_name(&self) -> &'static str {
        "Missing Values"
    }

    fn generate_cells(&self, ctx: &GenerationContext<'_>) -> Result<Vec<Cell>, ConfigurationError> {
        let columns = ctx.select_columns(ColumnFilter::Any)?;
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let incomplete: Vec<(&str, usize)> = columns
            .iter()
            .filter_map(|name| ctx.dataset.column(name))
            .filter(|meta| meta.null_count > 0)
            .map(|meta| (meta.name.as_str(), meta.null_count))
            .collect();

        if incomplete.is_empty() {
            return Ok(vec![Cell::markdown(format!(
                "{}\n\nAll {} analysed columns are complete: {}.",
                ctx.heading().content(),
                columns.len(),
                NO_MISSING_VALUES
            ))]);
        }

        let frame = ctx.frame(&columns);
        let mut cells = vec![ctx.heading()];

        if ctx.at_least(Verbosity::High) {
            let rows = ctx.dataset.height();
            let lines: Vec<String> = incomplete
                .iter()
                .map(|(name, count)| format!("- {}: {}", md_code(name), count_with_percentage(*count, rows)))
                .collect();
            cells.push(Cell::markdown(format!(
                "{} of {} analysed columns contain missing values:\n\n{}",
                incomplete.len(),
                columns.len(),
                lines.join("\n")
            )));
            cells.push(
                Cell::code(format!("bar_plot_missing_values({})\nplt.show()", frame)).with_imports([
                    helper_import("bar_plot_missing_values"),
                    IMPORT_PYPLOT.to_string(),
                ]),
            );
        }

        cells.push(
            Cell::code(ctx.call("missing_values_summary", &columns, Vec::new()))
                .with_imports([helper_import("missing_values_summary")]),
        );

        if ctx.at_least(Verbosity::Medium) {
            for (name, _) in &incomplete {
                cells.push(Cell::code(format!("{}.isna().sum()", ctx.column_expr(name))));
            }
        }

        Ok(cells)
    }
}
