//! Autocorrelation of numeric time series columns.

use super::{Analysis, ColumnFilter, GenerationContext, IMPORT_PANDAS, helper_import};
use crate::cell::Cell;
use crate::config::Verbosity;
use crate::error::ConfigurationError;
use crate::utils::dedent;

const IMPORT_STATSMODELS: &str =
    "from statsmodels.tsa.stattools import acf as sm_acf, pacf as sm_pacf";

const HELPERS: &str = r#"
    def _lags(series, nlags):
        return max(1, min(nlags, len(series) // 2 - 1))

    def acf_table(frame, nlags=10):
        return pd.DataFrame({
            name: pd.Series(sm_acf(frame[name].dropna(), nlags=_lags(frame[name].dropna(), nlags)))
            for name in frame.columns
        }).round(3)

    def pacf_table(frame, nlags=10):
        return pd.DataFrame({
            name: pd.Series(sm_pacf(frame[name].dropna(), nlags=_lags(frame[name].dropna(), nlags)))
            for name in frame.columns
        }).round(3)
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct Autocorrelation;

impl Analysis for Autocorrelation {
    fn kind(&self) -> &'static str {
        "autocorrelation"
    }

    fn default_name(&self) -> &'static str {
        "Autocorrelation"
    }

    fn generate_cells(&self, ctx: &GenerationContext<'_>) -> Result<Vec<Cell>, ConfigurationError> {
        let columns = ctx.select_columns(ColumnFilter::Numeric)?;
        if columns.is_empty() {
            return Ok(Vec::new());
        }
        let frame = ctx.frame(&columns);

        let mut cells = vec![ctx.heading()];

        if ctx.at_least(Verbosity::High) {
            cells.push(Cell::markdown(
                "The autocorrelation function (ACF) shows the correlation of a series with its own \
                 lagged values. The partial autocorrelation function (PACF) removes the effect of \
                 shorter lags, which helps choose the order of an autoregressive model."
                    .to_string(),
            ));
            cells.push(
                Cell::code(dedent(HELPERS)).with_imports([IMPORT_STATSMODELS, IMPORT_PANDAS]),
            );
        }

        cells.push(
            Cell::code(ctx.call("autocorrelation", &columns, Vec::new()))
                .with_imports([helper_import("autocorrelation")]),
        );

        if ctx.at_least(Verbosity::Medium) {
            cells.push(ctx.subheading("Autocorrelation Function"));
            cells.push(
                Cell::code(format!("plot_acf({})", frame)).with_imports([helper_import("plot_acf")]),
            );
            cells.push(ctx.subheading("Partial Autocorrelation Function"));
            cells.push(
                Cell::code(format!("plot_pacf({})", frame))
                    .with_imports([helper_import("plot_pacf")]),
            );
        }

        if ctx.at_least(Verbosity::High) {
            cells.push(ctx.subheading("Coefficients"));
            cells.push(Cell::code(format!("acf_table({})", frame)));
            cells.push(Cell::code(format!("pacf_table({})", frame)));
        }

        Ok(cells)
    }
}
