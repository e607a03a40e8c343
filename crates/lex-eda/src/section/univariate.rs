//! Univariate analysis: one column at a time.

use super::{
    Analysis, ColumnFilter, GenerationContext, IMPORT_NUMPY, IMPORT_PANDAS, helper_import,
};
use crate::cell::Cell;
use crate::config::Verbosity;
use crate::error::ConfigurationError;
use crate::utils::{DtypeCategory, count_with_percentage, dedent, md_code, md_escape, sample_values};

/// Maximum number of sampled values quoted in a column narrative.
const SAMPLE_SIZE: usize = 5;

const STATISTICS_DEFINITIONS: &str = r#"
    def default_descriptive_statistics():
        return {
            'mean': pd.Series.mean,
            'mode': lambda s: s.mode().iloc[0] if not s.mode().empty else np.nan,
            'standard deviation': pd.Series.std,
            'mean absolute deviation': lambda s: (s - s.mean()).abs().mean(),
            'median absolute deviation': lambda s: (s - s.median()).abs().median(),
            'relative standard deviation': lambda s: s.std() / s.mean() if s.mean() else np.nan,
            'kurtosis': pd.Series.kurt,
            'skewness': pd.Series.skew,
        }

    def default_quantile_statistics():
        return {
            'minimum': pd.Series.min,
            'maximum': pd.Series.max,
            'q1': lambda s: s.quantile(0.25),
            'median': pd.Series.median,
            'q3': lambda s: s.quantile(0.75),
            'range': lambda s: s.max() - s.min(),
            'interquartile range': lambda s: s.quantile(0.75) - s.quantile(0.25),
        }
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct Univariate;

impl Univariate {
    fn column_cell(ctx: &GenerationContext<'_>, column: &str, category: DtypeCategory) -> Cell {
        let series = ctx.column_expr(column);
        if category == DtypeCategory::Numeric {
            Cell::code(format!("numeric_statistics({series})\nhistogram({series})"))
                .with_imports([
                    helper_import("numeric_statistics"),
                    helper_import("histogram"),
                ])
        } else {
            Cell::code(format!(
                "top_most_frequent({series}, n_top={})\nbar_plot({series})",
                ctx.n_top()
            ))
            .with_imports([helper_import("top_most_frequent"), helper_import("bar_plot")])
        }
    }

    fn column_narrative(ctx: &GenerationContext<'_>, column: &str) -> Option<String> {
        let meta = ctx.dataset.column(column)?;
        let series = ctx.dataset.series(column).ok()?;
        let samples = sample_values(series, SAMPLE_SIZE, ctx.random_seed());
        let mut text = format!(
            "{} is a {} column with {} distinct values and {} missing.",
            md_code(column),
            meta.category,
            meta.unique_count,
            count_with_percentage(meta.null_count, ctx.dataset.height()),
        );
        if !samples.is_empty() {
            let samples: Vec<String> = samples.iter().map(|s| md_escape(s)).collect();
            text.push_str(&format!(" Sample values: {}.", samples.join(", ")));
        }
        Some(text)
    }
}

impl Analysis for Univariate {
    fn kind(&self) -> &'static str {
        "univariate"
    }

    fn default_name(&self) -> &'static str {
        "Univariate Analysis"
    }

    fn generate_cells(&self, ctx: &GenerationContext<'_>) -> Result<Vec<Cell>, ConfigurationError> {
        let columns = ctx.select_columns(ColumnFilter::Any)?;
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let mut cells = vec![ctx.heading()];

        if ctx.at_least(Verbosity::High) {
            cells.push(
                Cell::code(dedent(STATISTICS_DEFINITIONS)).with_imports([IMPORT_PANDAS, IMPORT_NUMPY]),
            );
        }

        cells.push(
            Cell::code(ctx.call("univariate_summary", &columns, Vec::new()))
                .with_imports([helper_import("univariate_summary")]),
        );

        if ctx.at_least(Verbosity::Medium) {
            for column in &columns {
                let Some(meta) = ctx.dataset.column(column) else {
                    continue;
                };
                if meta.null_count == ctx.dataset.height() {
                    cells.push(ctx.subheading(&format!("*{} - NULL*", md_escape(column))));
                    continue;
                }
                cells.push(ctx.subheading(&format!("*{} - {}*", md_escape(column), meta.category)));
                if ctx.at_least(Verbosity::High)
                    && let Some(text) = Self::column_narrative(ctx, column)
                {
                    cells.push(Cell::markdown(text));
                }
                cells.push(Self::column_cell(ctx, column, meta.category));
            }
        }

        Ok(cells)
    }
}
