//! Read-only dataset handle shared by every section during generation.

use crate::utils::{DtypeCategory, get_dtype_category};
use polars::prelude::*;
use serde::Serialize;
use std::sync::Arc;

/// Metadata cached per column when the handle is created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnMeta {
    pub name: String,
    pub dtype: String,
    pub category: DtypeCategory,
    pub null_count: usize,
    pub unique_count: usize,
}

/// Immutable, cheaply clonable reference to a tabular dataset.
///
/// Column metadata is computed once in [`DatasetHandle::new`]; sections only
/// read it.
#[derive(Debug, Clone)]
pub struct DatasetHandle {
    df: Arc<DataFrame>,
    columns: Arc<Vec<ColumnMeta>>,
    duplicate_rows: usize,
}

static_assertions::assert_impl_all!(DatasetHandle: Send, Sync);

impl DatasetHandle {
    /// Wrap a DataFrame and compute per-column metadata.
    pub fn new(df: DataFrame) -> PolarsResult<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for column in df.get_columns() {
            let series = column.as_materialized_series();
            let dtype = series.dtype();
            columns.push(ColumnMeta {
                name: series.name().to_string(),
                dtype: format!("{}", dtype),
                category: get_dtype_category(dtype),
                null_count: series.null_count(),
                unique_count: series.n_unique()?,
            });
        }

        let duplicate_rows = count_duplicate_rows(&df)?;

        Ok(Self {
            df: Arc::new(df),
            columns: Arc::new(columns),
            duplicate_rows,
        })
    }

    pub fn df(&self) -> &DataFrame {
        &self.df
    }

    pub fn height(&self) -> usize {
        self.df.height()
    }

    pub fn width(&self) -> usize {
        self.df.width()
    }

    /// Metadata for every column, in dataset order.
    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnMeta> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Names of the columns in the given category, in dataset order.
    pub fn columns_of(&self, category: DtypeCategory) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.category == category)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Total number of null cells across all columns.
    pub fn total_nulls(&self) -> usize {
        self.columns.iter().map(|c| c.null_count).sum()
    }

    /// Columns holding at most one distinct value.
    pub fn constant_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.unique_count <= 1)
            .map(|c| c.name.clone())
            .collect()
    }

    /// Number of fully duplicated rows.
    pub fn duplicate_rows(&self) -> usize {
        self.duplicate_rows
    }

    /// Borrow one column as a Series.
    pub fn series(&self, name: &str) -> PolarsResult<&Series> {
        Ok(self.df.column(name)?.as_materialized_series())
    }
}

fn count_duplicate_rows(df: &DataFrame) -> PolarsResult<usize> {
    if df.height() == 0 || df.width() == 0 {
        return Ok(0);
    }
    let unique = df
        .clone()
        .lazy()
        .unique(None, UniqueKeepStrategy::First)
        .collect()?;
    Ok(df.height() - unique.height())
}
