//! Two-dimensional UMAP embedding of the numeric columns.

use super::{Analysis, ColumnFilter, GenerationContext, IMPORT_PANDAS, helper_import};
use crate::cell::Cell;
use crate::config::{ConfigKey, ValueKind, Verbosity};
use crate::error::{ConfigErrorKind, ConfigurationError};
use crate::utils::{dedent, py_call, py_float, py_str};

use super::pair_plot::KEY_COLOR_COL;

const KEY_N_NEIGHBORS: &str = "n_neighbors";
const KEY_MIN_DIST: &str = "min_dist";
const KEY_METRIC: &str = "metric";

const DEFAULT_N_NEIGHBORS: i64 = 15;
const DEFAULT_MIN_DIST: f64 = 0.1;
const DEFAULT_METRIC: &str = "euclidean";

const KEYS: &[ConfigKey] = &[
    ConfigKey::new(KEY_N_NEIGHBORS, ValueKind::Int),
    ConfigKey::new(KEY_MIN_DIST, ValueKind::Float),
    ConfigKey::new(KEY_METRIC, ValueKind::Str),
    ConfigKey::new(KEY_COLOR_COL, ValueKind::Str),
];

const HELPER: &str = r#"
    def embed_umap(frame, n_neighbors, min_dist, metric, random_state):
        import umap
        numeric = frame.select_dtypes('number').dropna()
        scaled = (numeric - numeric.mean()) / numeric.std()
        reducer = umap.UMAP(
            n_neighbors=n_neighbors, min_dist=min_dist, metric=metric, random_state=random_state
        )
        embedding = reducer.fit_transform(scaled)
        return pd.DataFrame(embedding, index=numeric.index, columns=['umap_x', 'umap_y'])
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct Umap;

#[derive(Debug, Clone)]
struct UmapParams {
    n_neighbors: i64,
    min_dist: f64,
    metric: String,
}

impl Umap {
    fn params(ctx: &GenerationContext<'_>) -> Result<UmapParams, ConfigurationError> {
        let n_neighbors = ctx
            .config
            .get_int(KEY_N_NEIGHBORS)
            .unwrap_or(DEFAULT_N_NEIGHBORS);
        if n_neighbors < 2 {
            return Err(ctx.error(ConfigErrorKind::InvalidValue {
                key: KEY_N_NEIGHBORS.to_string(),
                expected: "an integer of at least 2".to_string(),
                found: n_neighbors.to_string(),
            }));
        }
        let min_dist = ctx.config.get_float(KEY_MIN_DIST).unwrap_or(DEFAULT_MIN_DIST);
        if !(0.0..=1.0).contains(&min_dist) {
            return Err(ctx.error(ConfigErrorKind::InvalidValue {
                key: KEY_MIN_DIST.to_string(),
                expected: "a float between 0 and 1".to_string(),
                found: min_dist.to_string(),
            }));
        }
        let metric = ctx
            .config
            .get_str(KEY_METRIC)
            .unwrap_or(DEFAULT_METRIC)
            .to_string();
        Ok(UmapParams {
            n_neighbors,
            min_dist,
            metric,
        })
    }
}

impl Analysis for Umap {
    fn kind(&self) -> &'static str {
        "umap"
    }

    fn default_name(&self) -> &'static str {
        "UMAP"
    }

    fn config_keys(&self) -> &'static [ConfigKey] {
        KEYS
    }

    fn generate_cells(&self, ctx: &GenerationContext<'_>) -> Result<Vec<Cell>, ConfigurationError> {
        let columns = ctx.select_columns_min(ColumnFilter::Numeric, 2)?;
        let params = Self::params(ctx)?;
        let color_col = ctx.optional_column(KEY_COLOR_COL)?;
        if columns.is_empty() {
            return Ok(Vec::new());
        }

        let mut cells = vec![ctx.heading()];

        if ctx.at_least(Verbosity::High) {
            cells.push(Cell::markdown(format!(
                "UMAP projects the {} standardised numeric columns onto two dimensions while \
                 preserving local neighbourhoods. `n_neighbors` trades local for global structure \
                 and `min_dist` controls how tightly points are packed.",
                columns.len()
            )));
            cells.push(Cell::code(dedent(HELPER)).with_imports([IMPORT_PANDAS]));
        }

        let mut color_arg = Vec::new();
        if let Some(color) = color_col {
            color_arg.push((KEY_COLOR_COL, py_str(color)));
        }
        cells.push(
            Cell::code(ctx.call("plot_umap", &columns, color_arg.clone()))
                .with_imports([helper_import("plot_umap")]),
        );

        let params_args = vec![
            (KEY_N_NEIGHBORS, params.n_neighbors.to_string()),
            (KEY_MIN_DIST, py_float(params.min_dist)),
            (KEY_METRIC, py_str(&params.metric)),
            ("random_state", ctx.random_seed().to_string()),
        ];

        if ctx.at_least(Verbosity::Medium) {
            let mut args = params_args.clone();
            args.extend(color_arg);
            cells.push(ctx.subheading("Parameterized Embedding"));
            cells.push(
                Cell::code(ctx.call("plot_umap", &columns, args))
                    .with_imports([helper_import("plot_umap")]),
            );
        }

        if ctx.at_least(Verbosity::High) {
            let mut args = vec![("", ctx.frame(&columns))];
            args.extend(params_args);
            cells.push(Cell::code(format!(
                "umap_embedding = {}\numap_embedding.head()",
                py_call("embed_umap", &args)
            )));
        }

        Ok(cells)
    }
}
