//! Shared utilities for report generation.
//!
//! This module contains dtype classification helpers used by the dataset
//! handle and the sections, plus the small code-formatting helpers every
//! section uses when it writes Python source into notebook cells.

use once_cell::sync::Lazy;
use polars::prelude::*;
use rand::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Category of a column data type for analysis purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DtypeCategory {
    /// Integer or floating point numbers
    Numeric,
    /// Date or datetime types
    Datetime,
    /// Boolean type
    Boolean,
    /// String/text or categorical type
    String,
    /// Other/unknown types
    Other,
}

impl DtypeCategory {
    /// Returns the lowercase name used in narrative cells.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numeric => "numeric",
            Self::Datetime => "datetime",
            Self::Boolean => "boolean",
            Self::String => "text",
            Self::Other => "other",
        }
    }

    /// Whether a column of this category is analysed with frequency tables
    /// rather than moments.
    pub fn is_categorical(&self) -> bool {
        matches!(self, Self::Boolean | Self::String)
    }
}

impl std::fmt::Display for DtypeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Datetime(_, _) | DataType::Date | DataType::Time | DataType::Duration(_)
    )
}

/// Get the category of a DataType.
pub fn get_dtype_category(dtype: &DataType) -> DtypeCategory {
    if is_numeric_dtype(dtype) {
        DtypeCategory::Numeric
    } else if is_datetime_dtype(dtype) {
        DtypeCategory::Datetime
    } else if matches!(dtype, DataType::Boolean) {
        DtypeCategory::Boolean
    } else if matches!(dtype, DataType::String | DataType::Categorical(_, _)) {
        DtypeCategory::String
    } else {
        DtypeCategory::Other
    }
}

// =============================================================================
// Sampling Utilities
// =============================================================================

/// Collect up to `max_samples` non-null values from a Series, sampled with a
/// fixed seed so that repeated generation yields identical narrative.
pub fn sample_values(series: &Series, max_samples: usize, seed: u64) -> Vec<String> {
    let non_null = series.drop_nulls();
    if non_null.is_empty() {
        return Vec::new();
    }

    let sample_size = std::cmp::min(max_samples, non_null.len());
    let mut rng = StdRng::seed_from_u64(seed);
    let indices: Vec<usize> = (0..non_null.len()).collect();
    let mut sampled: Vec<usize> = indices
        .choose_multiple(&mut rng, sample_size)
        .copied()
        .collect();
    sampled.sort_unstable();

    sampled
        .into_iter()
        .filter_map(|idx| non_null.get(idx).ok())
        .map(|val| match val {
            AnyValue::String(s) => s.to_string(),
            other => format!("{}", other),
        })
        .collect()
}

// =============================================================================
// Code Formatting Utilities
// =============================================================================

static PYTHON_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Check if a string is a valid Python identifier (used for the dataset variable name).
pub fn is_python_identifier(s: &str) -> bool {
    PYTHON_IDENTIFIER.is_match(s)
}

/// Quote a string as a single-quoted Python literal.
///
/// # Example
///
/// ```rust,ignore
/// assert_eq!(py_str("it's"), r"'it\'s'");
/// ```
pub fn py_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Format a list of strings as a Python list literal.
pub fn py_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|s| py_str(s)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Format column pairs as a Python list of tuples.
pub fn py_pairs(pairs: &[(String, String)]) -> String {
    let quoted: Vec<String> = pairs
        .iter()
        .map(|(a, b)| format!("({}, {})", py_str(a), py_str(b)))
        .collect();
    format!("[{}]", quoted.join(", "))
}

/// Format a float so that it round-trips as a Python float literal.
pub fn py_float(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// Build a Python call expression: `func(arg1, key=value, ...)`.
///
/// Arguments are emitted in the order given, which keeps generated code
/// stable across runs.
pub fn py_call(func: &str, args: &[(&str, String)]) -> String {
    let rendered: Vec<String> = args
        .iter()
        .map(|(key, value)| {
            if key.is_empty() {
                value.clone()
            } else {
                format!("{}={}", key, value)
            }
        })
        .collect();
    format!("{}({})", func, rendered.join(", "))
}

/// Strip the common leading indentation from every non-blank line and trim
/// surrounding blank lines.
pub fn dedent(code: &str) -> String {
    let indent = code
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    code.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                &line[indent..]
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
        .trim_matches('\n')
        .to_string()
}

/// Escape text so that it renders literally inside Markdown prose.
pub fn md_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(
            c,
            '\\' | '`' | '*' | '_' | '[' | ']' | '<' | '>' | '#' | '|' | '~' | '!' | '&'
        ) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Wrap text in a Markdown code span.
///
/// The fence is one backtick longer than the longest backtick run inside
/// `text`, so names containing backticks stay intact.
pub fn md_code(text: &str) -> String {
    let longest = text.split(|c: char| c != '`').map(str::len).max().unwrap_or(0);
    let fence = "`".repeat(longest + 1);
    if text.starts_with('`') || text.ends_with('`') {
        format!("{fence} {text} {fence}")
    } else {
        format!("{fence}{text}{fence}")
    }
}

/// Format a count with its percentage of a total, e.g. `"3 (42.86 %)"`.
pub fn count_with_percentage(count: usize, total: usize) -> String {
    if total == 0 {
        return format!("{}", count);
    }
    format!("{} ({:.2} %)", count, 100.0 * count as f64 / total as f64)
}

// =============================================================================
// Tests
// =============================================================================
