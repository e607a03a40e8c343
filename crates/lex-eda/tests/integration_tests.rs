//! Integration tests for report generation and export.
//!
//! These tests build reports over in-memory datasets and export them with a
//! scripted execution engine, so no Python interpreter is needed.

use lex_eda::config::{ConfigMap, Verbosity};
use lex_eda::section::{
    ANALYSIS_KINDS, Correlation, GroupAnalysis, MissingValues, Overview, Section, Univariate,
    analysis_for_kind, bivariate_analysis, group_analysis, timeseries_analysis,
};
use lex_eda::{
    CancellationToken, Cell, CellFailure, CellOutput, ConfigErrorKind, DatasetHandle, Document,
    ExecutionEngine, ExecutionPolicy, ExecutionSession, ExportError, ExportStage, ExportStatus,
    Exporter, Figure, Report, ReportConfig, ReportDefinition, TargetFormat, merge_imports,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn load_csv(filename: &str) -> DataFrame {
    let path = fixtures_path().join(filename);
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

fn titanic() -> DataFrame {
    df! {
        "age" => &[Some(22.0f64), Some(38.0), None, Some(35.0), Some(54.0), Some(2.0)],
        "fare" => &[7.25f64, 71.28, 7.92, 53.1, 51.86, 21.07],
        "survived" => &[0i64, 1, 1, 1, 0, 0],
        "sex" => &["male", "female", "female", "female", "male", "male"],
        "class" => &["third", "first", "third", "first", "first", "third"],
    }
    .unwrap()
}

fn report(sections: Vec<Section>) -> Report {
    report_with(titanic(), ReportConfig::default(), sections)
}

fn report_with(df: DataFrame, config: ReportConfig, sections: Vec<Section>) -> Report {
    let mut report = Report::new(df, config).unwrap();
    for section in sections {
        report.add_section(section);
    }
    report
}

/// Body cell contents grouped by top-level section.
fn contents_by_section(document: &Document) -> BTreeMap<String, BTreeSet<String>> {
    let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for entry in document.body() {
        map.entry(entry.section.to_string())
            .or_default()
            .insert(entry.cell.content().to_string());
    }
    map
}

/// Engine that answers from a script: cells containing a `fail_on` needle
/// raise, cells containing an `outputs` needle print the paired text.
#[derive(Default)]
struct ScriptedEngine {
    fail_on: Vec<&'static str>,
    outputs: Vec<(&'static str, &'static str)>,
    figure_on: Option<&'static str>,
    cancel_after: Option<(usize, CancellationToken)>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
    ran: Arc<Mutex<Vec<String>>>,
}

struct ScriptedSession {
    fail_on: Vec<&'static str>,
    outputs: Vec<(&'static str, &'static str)>,
    figure_on: Option<&'static str>,
    cancel_after: Option<(usize, CancellationToken)>,
    closed: Arc<AtomicUsize>,
    ran: Arc<Mutex<Vec<String>>>,
}

impl ExecutionEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn open_session(&self) -> Result<Box<dyn ExecutionSession>, ExportError> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            fail_on: self.fail_on.clone(),
            outputs: self.outputs.clone(),
            figure_on: self.figure_on,
            cancel_after: self.cancel_after.clone(),
            closed: self.closed.clone(),
            ran: self.ran.clone(),
        }))
    }
}

impl ExecutionSession for ScriptedSession {
    fn run_cell(&mut self, _index: usize, cell: &Cell) -> Result<CellOutput, CellFailure> {
        let code = cell.content();
        let count = {
            let mut ran = self.ran.lock().unwrap();
            ran.push(code.to_string());
            ran.len()
        };
        if let Some((after, token)) = &self.cancel_after
            && count >= *after
        {
            token.cancel();
        }

        if self.fail_on.iter().any(|needle| code.contains(needle)) {
            return Err(CellFailure::Raised {
                ename: "ValueError".to_string(),
                evalue: "could not convert string to float: 'male'".to_string(),
                traceback: vec!["Traceback (most recent call last):\n".to_string()],
            });
        }

        let mut output = CellOutput::empty();
        for (needle, text) in &self.outputs {
            if code.contains(needle) {
                output.stdout.push_str(text);
            }
        }
        if let Some(needle) = self.figure_on
            && code.contains(needle)
        {
            output.figures.push(Figure::png("iVBORw0KGgo="));
        }
        Ok(output)
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Generation
// ============================================================================

#[test]
fn test_generate_is_idempotent() {
    let report = Report::default_sections(
        DatasetHandle::new(titanic()).unwrap(),
        ReportConfig::builder()
            .verbosity(Verbosity::High)
            .build()
            .unwrap(),
    );

    let first = report.generate().unwrap();
    let second = report.generate().unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_verbosity_superset_per_section() {
    let sections = || {
        let mut sections: Vec<Section> = ANALYSIS_KINDS
            .iter()
            .filter(|kind| **kind != "group_analysis")
            .map(|kind| Section::from_analysis(analysis_for_kind(kind).unwrap()))
            .collect();
        sections.push(group_analysis(&["sex"]));
        sections
    };

    let by_level: Vec<BTreeMap<String, BTreeSet<String>>> = Verbosity::ALL
        .iter()
        .map(|level| {
            let config = ReportConfig::builder().verbosity(*level).build().unwrap();
            let document = report_with(titanic(), config, sections()).generate().unwrap();
            contents_by_section(&document)
        })
        .collect();

    let (low, medium, high) = (&by_level[0], &by_level[1], &by_level[2]);
    for (section, low_cells) in low {
        let medium_cells = &medium[section];
        let high_cells = &high[section];
        assert!(
            low_cells.is_subset(medium_cells),
            "{section}: Low cells missing from Medium"
        );
        assert!(
            medium_cells.is_subset(high_cells),
            "{section}: Medium cells missing from High"
        );
    }
    assert!(high.values().map(BTreeSet::len).sum::<usize>() > low.values().map(BTreeSet::len).sum::<usize>());
}

#[test]
fn test_order_follows_preorder_and_swaps_blocks() {
    let forward = report(vec![Section::leaf(Overview), Section::leaf(MissingValues)])
        .generate()
        .unwrap();
    let swapped = report(vec![Section::leaf(MissingValues), Section::leaf(Overview)])
        .generate()
        .unwrap();

    let block = |doc: &Document, name: &str| -> Vec<Cell> {
        doc.section_cells(name).cloned().collect()
    };
    let overview = block(&forward, "Overview");
    let missing = block(&forward, "Missing Values");
    assert!(!overview.is_empty());
    assert!(!missing.is_empty());

    let forward_body: Vec<Cell> = forward.body().iter().map(|c| c.cell.clone()).collect();
    let swapped_body: Vec<Cell> = swapped.body().iter().map(|c| c.cell.clone()).collect();
    assert_eq!(forward_body, [overview.clone(), missing.clone()].concat());
    assert_eq!(swapped_body, [missing, overview].concat());
    assert_eq!(forward.preamble(), swapped.preamble());
}

#[test]
fn test_group_heading_precedes_children() {
    let document = report(vec![
        Section::leaf(Overview),
        timeseries_analysis(),
        Section::leaf(Univariate),
    ])
    .generate()
    .unwrap();

    let paths: Vec<String> = document
        .body()
        .iter()
        .map(|c| c.section.to_string())
        .collect();
    let group_start = paths.iter().position(|p| p == "Timeseries Analysis").unwrap();
    let child_start = paths
        .iter()
        .position(|p| p == "Timeseries Analysis / Autocorrelation")
        .unwrap();
    let univariate_start = paths.iter().position(|p| p == "Univariate Analysis").unwrap();
    assert!(paths[..group_start].iter().all(|p| p == "Overview"));
    assert_eq!(child_start, group_start + 1);
    assert!(child_start < univariate_start);
    assert_eq!(
        document.body()[group_start].cell.content(),
        "## Timeseries Analysis"
    );
}

#[test]
fn test_merge_imports_is_order_independent() {
    let document = report(vec![Section::leaf(Overview), Section::leaf(Correlation)])
        .generate()
        .unwrap();
    let overview: Vec<Cell> = document.section_cells("Overview").cloned().collect();
    let correlation: Vec<Cell> = document.section_cells("Correlation").cloned().collect();

    let ab = merge_imports(overview.iter().chain(correlation.iter()));
    let ba = merge_imports(correlation.iter().chain(overview.iter()));
    assert_eq!(ab, ba);
    assert!(!ab.is_empty());

    // Imports appear once, in the preamble, before any analysis cell.
    let preamble = document.preamble().content();
    for import in &ab {
        assert_eq!(preamble.lines().filter(|l| l == import).count(), 1, "{import}");
    }
    for entry in document.body() {
        assert!(!entry.cell.content().starts_with("import "));
    }
}

#[test]
fn test_all_configuration_errors_collected() {
    let result = report(vec![
        Section::leaf(Correlation).with_option("columns", vec!["sex"]),
        Section::leaf(Overview),
        Section::leaf(GroupAnalysis),
        Section::leaf(Univariate).with_option("bogus", true),
    ])
    .generate();

    let err = result.unwrap_err();
    assert_eq!(err.errors.len(), 3);
    assert_eq!(
        err.sections(),
        vec!["Correlation", "Group Analysis", "Univariate Analysis"]
    );
    assert!(matches!(
        err.errors[0].kind,
        ConfigErrorKind::IncompatibleColumns { .. }
    ));
    assert!(matches!(err.errors[1].kind, ConfigErrorKind::MissingKey { .. }));
    assert!(matches!(err.errors[2].kind, ConfigErrorKind::UnknownKeys { .. }));
}

#[test]
fn test_missing_values_without_nulls_emits_single_summary() {
    let df = df! {
        "a" => &[1i64, 2, 3],
        "b" => &["x", "y", "z"],
        "c" => &[0.5f64, 1.5, 2.5],
    }
    .unwrap();
    let document = report_with(df, ReportConfig::default(), vec![Section::leaf(MissingValues)])
        .generate()
        .unwrap();

    let cells: Vec<&Cell> = document.section_cells("Missing Values").collect();
    assert_eq!(cells.len(), 1);
    assert!(!cells[0].is_code());
    assert!(cells[0].content().contains("no missing values found"));
}

#[test]
fn test_numeric_section_on_text_column_is_error() {
    let df = df! {
        "name" => &["Braund", "Cumings", "Heikkinen"],
        "ticket" => &["A/5 21171", "PC 17599", "STON/O2."],
    }
    .unwrap();
    let err = report_with(
        df,
        ReportConfig::default(),
        vec![Section::leaf(Correlation).with_config(ConfigMap::new().with("columns", vec!["name"]))],
    )
    .generate()
    .unwrap_err();

    assert_eq!(err.errors.len(), 1);
    assert_eq!(err.errors[0].section.to_string(), "Correlation");
    assert_eq!(err.errors[0].columns(), ["name"]);
    assert!(err.to_string().contains("name"));
}

#[test]
fn test_numeric_section_on_text_dataset_skips_automatically() {
    let df = df! { "name" => &["Braund", "Cumings", "Heikkinen"] }.unwrap();
    let document = report_with(df, ReportConfig::default(), vec![Section::leaf(Correlation)])
        .generate()
        .unwrap();
    assert_eq!(document.section_cells("Correlation").count(), 0);
}

#[test]
fn test_bivariate_group_restricted_to_numeric_columns() {
    let document = report(vec![
        bivariate_analysis().with_option("columns", vec!["age", "fare"]),
    ])
    .generate()
    .unwrap();

    let sections = contents_by_section(&document);
    assert!(sections.contains_key("Bivariate Analysis / Correlation"));
    assert!(sections.contains_key("Bivariate Analysis / Pair Plot"));
    assert!(!sections.contains_key("Bivariate Analysis / Contingency Table"));
    assert!(
        sections["Bivariate Analysis / Correlation"]
            .iter()
            .any(|c| c.contains("columns=['age', 'fare']"))
    );

    let from_definition = ReportDefinition::from_json(
        r#"{ "config": { "columns": ["age", "fare", "sex"] },
             "sections": [{ "kind": "bivariate_analysis" }] }"#,
    )
    .unwrap()
    .into_report(DatasetHandle::new(titanic()).unwrap(), ReportConfig::default())
    .unwrap();
    let document = from_definition.generate().unwrap();
    assert!(
        !contents_by_section(&document).contains_key("Bivariate Analysis / Contingency Table")
    );

    let err = report(vec![Section::leaf(Correlation).with_option("columns", vec!["age"])])
        .generate()
        .unwrap_err();
    assert_eq!(err.sections(), vec!["Correlation"]);
}

#[test]
fn test_report_from_fixture_csv() {
    let df = load_csv("titanic_subset.csv");
    let definition = ReportDefinition::from_json(
        r#"{
            "title": "Titanic Subset",
            "verbosity": "medium",
            "sections": [
                { "kind": "overview", "config": { "checks": ["quick_info", "duplicate_rows"] } },
                { "kind": "missing_values" },
                { "kind": "group_analysis", "config": { "groupby": ["Sex"] } }
            ]
        }"#,
    )
    .unwrap();
    let report = definition
        .into_report(
            DatasetHandle::new(df).unwrap(),
            ReportConfig::builder()
                .load_code("df = pd.read_csv('titanic_subset.csv')")
                .build()
                .unwrap(),
        )
        .unwrap();

    let document = report.generate().unwrap();
    assert_eq!(document.title(), "Titanic Subset");
    assert_eq!(
        document.setup()[0].content(),
        "df = pd.read_csv('titanic_subset.csv')"
    );
    // Age has one null, so missing values reports per-column counts at Medium.
    assert!(
        document
            .section_cells("Missing Values")
            .any(|c| c.content().contains("df['Age'].isna().sum()"))
    );
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_continue_on_error_yields_partial_success() {
    let document = report(vec![Section::leaf(Overview), Section::leaf(Correlation)])
        .generate()
        .unwrap();
    let engine = ScriptedEngine {
        fail_on: vec!["plot_correlations("],
        outputs: vec![("overview(", "6 rows x 5 columns\n")],
        ..ScriptedEngine::default()
    };
    let opened = engine.opened.clone();
    let closed = engine.closed.clone();

    let artifact = Exporter::builder()
        .engine(Arc::new(engine))
        .build()
        .export(&document, TargetFormat::Notebook, ExecutionPolicy::ContinueOnError)
        .unwrap();

    assert_eq!(artifact.manifest.status, ExportStatus::PartialSuccess);
    assert_eq!(artifact.manifest.failures.len(), 1);
    assert_eq!(artifact.manifest.failures[0].section, "Correlation");
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert_eq!(closed.load(Ordering::SeqCst), 1);

    let notebook: serde_json::Value = serde_json::from_slice(&artifact.bytes).unwrap();
    let outputs: Vec<&serde_json::Value> = notebook["cells"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|c| c["outputs"].as_array())
        .flatten()
        .collect();
    assert!(outputs.iter().any(|o| o["output_type"] == "stream"
        && o["text"][0] == "6 rows x 5 columns\n"));
    assert!(outputs.iter().any(|o| o["output_type"] == "error" && o["ename"] == "ValueError"));
}

#[test]
fn test_fail_fast_stops_at_first_failure() {
    let document = report(vec![
        Section::leaf(Correlation),
        Section::leaf(Overview),
    ])
    .generate()
    .unwrap();
    let engine = ScriptedEngine {
        fail_on: vec!["plot_correlations("],
        ..ScriptedEngine::default()
    };
    let ran = engine.ran.clone();
    let closed = engine.closed.clone();

    let err = Exporter::builder()
        .engine(Arc::new(engine))
        .build()
        .export(&document, TargetFormat::Html, ExecutionPolicy::FailFast)
        .unwrap_err();

    let ExportError::Execution { partial, error } = err else {
        panic!("expected execution error");
    };
    assert_eq!(error.section, "Correlation");
    assert!(partial.has_failures());
    assert!(!ran.lock().unwrap().iter().any(|c| c.contains("overview(")));
    assert_eq!(closed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cancellation_between_cells_releases_session() {
    let document = Report::default_sections(
        DatasetHandle::new(titanic()).unwrap(),
        ReportConfig::default(),
    )
    .generate()
    .unwrap();
    let token = CancellationToken::new();
    let engine = ScriptedEngine {
        cancel_after: Some((2, token.clone())),
        ..ScriptedEngine::default()
    };
    let ran = engine.ran.clone();
    let closed = engine.closed.clone();
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = stages.clone();

    let err = Exporter::builder()
        .engine(Arc::new(engine))
        .cancellation_token(token)
        .on_progress(move |update| sink.lock().unwrap().push(update.stage))
        .build()
        .export(&document, TargetFormat::Notebook, ExecutionPolicy::ContinueOnError)
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(ran.lock().unwrap().len(), 2);
    assert_eq!(closed.load(Ordering::SeqCst), 1);
    assert_eq!(stages.lock().unwrap().last(), Some(&ExportStage::Cancelled));
}

#[test]
fn test_html_export_inlines_figures_and_errors() {
    let document = report(vec![Section::leaf(MissingValues).with_verbosity(Verbosity::High)])
        .generate()
        .unwrap();
    let engine = ScriptedEngine {
        figure_on: Some("bar_plot_missing_values("),
        fail_on: vec!["missing_values_summary("],
        ..ScriptedEngine::default()
    };

    let artifact = Exporter::builder()
        .engine(Arc::new(engine))
        .build()
        .export(&document, TargetFormat::Html, ExecutionPolicy::ContinueOnError)
        .unwrap();

    let html = String::from_utf8(artifact.bytes).unwrap();
    assert!(html.contains("data:image/png;base64,iVBORw0KGgo="));
    assert!(html.contains("class=\"error\""));
    assert_eq!(artifact.manifest.failures.len(), 1);
}

#[test]
fn test_html_export_escapes_markup_in_column_names() {
    let df = df! {
        "<img src=x onerror=alert(1)>" => &[1.0f64, 2.0, 3.0],
        "fare_*usd*" => &[7.25f64, 71.28, 8.05],
    }
    .unwrap();
    let document = report_with(
        df,
        ReportConfig::default(),
        vec![Section::leaf(Univariate).with_verbosity(Verbosity::High)],
    )
    .generate()
    .unwrap();

    let artifact = Exporter::default()
        .export(&document, TargetFormat::Html, ExecutionPolicy::ContinueOnError)
        .unwrap();

    let html = String::from_utf8(artifact.bytes).unwrap();
    assert!(!html.contains("<img src=x"));
    assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
    assert!(html.contains("fare_*usd*"));
    assert!(!html.contains("<em>usd</em>"));
}

#[test]
fn test_export_script_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("eda.py");
    let document = report(vec![Section::leaf(Overview)]).generate().unwrap();

    let artifact = Exporter::default()
        .export_to(&document, TargetFormat::Script, ExecutionPolicy::FailFast, &path)
        .unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written.as_bytes(), artifact.bytes.as_slice());
    assert!(written.starts_with("# %% [markdown]\n# # Exploratory Data Analysis Report\n"));
    assert!(written.contains("# %%\noverview(df)\n"));
    assert_eq!(artifact.manifest.engine, "dry-run");
}
