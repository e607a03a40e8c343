//! Pairwise scatter plots of numeric columns.

use super::{
    Analysis, ColumnFilter, GenerationContext, IMPORT_PANDAS, KEY_COLUMNS_X, KEY_COLUMNS_Y,
    helper_import,
};
use crate::cell::Cell;
use crate::config::{ConfigKey, KEY_COLUMNS, ValueKind, Verbosity};
use crate::error::ConfigurationError;
use crate::utils::{dedent, md_code, py_call, py_list, py_str};

pub(crate) const KEY_COLOR_COL: &str = "color_col";

const KEYS: &[ConfigKey] = &[
    ConfigKey::new(KEY_COLOR_COL, ValueKind::Str),
    ConfigKey::new(KEY_COLUMNS_X, ValueKind::List),
    ConfigKey::new(KEY_COLUMNS_Y, ValueKind::List),
];

const HELPER: &str = r#"
    def top_pairs(frame, n):
        matrix = frame.select_dtypes('number').corr().abs()
        pairs = [
            (a, b, matrix.loc[a, b])
            for i, a in enumerate(matrix.columns)
            for b in matrix.columns[i + 1:]
        ]
        table = pd.DataFrame(pairs, columns=['column_a', 'column_b', 'abs_pearson'])
        return table.sort_values('abs_pearson', ascending=False).head(n).round(2)
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct PairPlot;

impl Analysis for PairPlot {
    fn kind(&self) -> &'static str {
        "pair_plot"
    }

    fn default_name(&self) -> &'static str {
        "Pair Plot"
    }

    fn config_keys(&self) -> &'static [ConfigKey] {
        KEYS
    }

    fn generate_cells(&self, ctx: &GenerationContext<'_>) -> Result<Vec<Cell>, ConfigurationError> {
        let xy = ctx.select_xy(ColumnFilter::Numeric)?;
        let color_col = ctx.optional_column(KEY_COLOR_COL)?;

        // Plotted columns in first-seen order, plus the selection arguments.
        let (columns, mut args) = match xy {
            Some((x, y)) => {
                if x.is_empty() || y.is_empty() {
                    return Ok(Vec::new());
                }
                let mut columns = x.clone();
                columns.extend(y.iter().filter(|c| !x.contains(c)).cloned());
                let args = vec![
                    ("", ctx.dataset_name().to_string()),
                    (KEY_COLUMNS_X, py_list(&x)),
                    (KEY_COLUMNS_Y, py_list(&y)),
                ];
                (columns, args)
            }
            None => {
                let columns = ctx.select_columns_min(ColumnFilter::Numeric, 2)?;
                if columns.is_empty() {
                    return Ok(Vec::new());
                }
                let mut args = vec![("", ctx.dataset_name().to_string())];
                if ctx.has_column_subset() {
                    args.push((KEY_COLUMNS, py_list(&columns)));
                }
                (columns, args)
            }
        };
        if let Some(color) = color_col {
            args.push((KEY_COLOR_COL, py_str(color)));
        }

        let mut cells = vec![ctx.heading()];

        if ctx.at_least(Verbosity::High) {
            let mut text = format!(
                "Scatter plots of every pair of the {} numeric columns, with each column's \
                 distribution on the diagonal.",
                columns.len()
            );
            if let Some(color) = color_col {
                text.push_str(&format!(" Points are coloured by {}.", md_code(color)));
            }
            cells.push(Cell::markdown(text));
            cells.push(Cell::code(dedent(HELPER)).with_imports([IMPORT_PANDAS]));
        }

        cells.push(
            Cell::code(py_call("plot_pairplot", &args))
                .with_imports([helper_import("plot_pairplot")]),
        );

        if ctx.at_least(Verbosity::Medium) {
            for column in &columns {
                cells.push(
                    Cell::code(format!("plot_distribution({})", ctx.column_expr(column)))
                        .with_imports([helper_import("plot_distribution")]),
                );
            }
        }

        if ctx.at_least(Verbosity::High) {
            let frame = format!("{}[{}]", ctx.dataset_name(), py_list(&columns));
            cells.push(Cell::code(format!("top_pairs({}, n={})", frame, ctx.n_top())));
        }

        Ok(cells)
    }
}
