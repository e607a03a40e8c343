//! CLI entry point for EDA report generation.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, ValueEnum};
use lex_eda::utils::py_str;
use lex_eda::{
    Artifact, DatasetHandle, ExecutionEngine, ExecutionPolicy, ExportError, Exporter,
    PythonEngine, Report, ReportConfig, ReportDefinition, TargetFormat, Verbosity,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// CLI-compatible output format enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFormat {
    /// Jupyter notebook (.ipynb)
    Notebook,
    /// Standalone HTML page
    Html,
    /// Python script with `# %%` cells
    Script,
}

impl From<CliFormat> for TargetFormat {
    fn from(cli: CliFormat) -> Self {
        match cli {
            CliFormat::Notebook => TargetFormat::Notebook,
            CliFormat::Html => TargetFormat::Html,
            CliFormat::Script => TargetFormat::Script,
        }
    }
}

/// CLI-compatible verbosity enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliVerbosity {
    /// One summary cell per section
    Low,
    /// Adds per-column breakdowns
    Medium,
    /// Adds narrative and helper definitions
    High,
}

impl From<CliVerbosity> for Verbosity {
    fn from(cli: CliVerbosity) -> Self {
        match cli {
            CliVerbosity::Low => Verbosity::Low,
            CliVerbosity::Medium => Verbosity::Medium,
            CliVerbosity::High => Verbosity::High,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    author = "Lex Machina Team",
    version,
    about = "Exploratory Data Analysis report generator",
    long_about = "Generates an exploratory data analysis notebook for a CSV or Parquet dataset.\n\n\
                  EXAMPLES:\n  \
                  # Unexecuted notebook with the default sections\n  \
                  lex-eda -i titanic.csv\n\n  \
                  # Executed HTML report\n  \
                  lex-eda -i titanic.csv -o report.html --execute\n\n  \
                  # Custom sections from a JSON definition\n  \
                  lex-eda -i titanic.csv --definition report.json --verbosity high"
)]
struct Args {
    /// Path to the CSV or Parquet file to analyse
    #[arg(short, long)]
    input: String,

    /// Output file
    ///
    /// If not specified, uses "<input_name>_eda.<ext>" in the current directory
    #[arg(short, long)]
    output: Option<String>,

    /// Output format
    ///
    /// If not specified, it is taken from the output extension (default: notebook)
    #[arg(short, long, value_enum)]
    format: Option<CliFormat>,

    /// JSON report definition (sections, verbosity, config)
    ///
    /// If not specified, the default report is generated
    #[arg(short, long)]
    definition: Option<String>,

    /// Default verbosity for sections without their own
    #[arg(short, long, value_enum)]
    verbosity: Option<CliVerbosity>,

    /// Report title
    #[arg(short, long)]
    title: Option<String>,

    /// Execute the notebook with a Python interpreter
    #[arg(short = 'x', long)]
    execute: bool,

    /// Python interpreter used with --execute
    #[arg(long, default_value = "python3")]
    python: String,

    /// Stop at the first failing cell instead of recording the failure
    #[arg(long)]
    fail_fast: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the export manifest as JSON to stdout instead of a summary
    ///
    /// Disables all progress logs; only outputs the final JSON.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let format = resolve_format(&args);
    let output = args
        .output
        .clone()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("{}_eda.{}", file_stem(&args.input), format.extension())));

    info!("Loading dataset from: {}", args.input);
    let data = load_dataset(&args.input)?;
    info!("Dataset loaded successfully: {:?}", data.shape());
    let dataset = DatasetHandle::new(data)?;

    let report = build_report(&args, dataset)?;
    let document = match report.generate() {
        Ok(document) => document,
        Err(e) => {
            for failure in &e.errors {
                error!("{}", failure);
            }
            return fail(&args, ExportError::Build(e));
        }
    };
    info!("Generated {} cells", document.cell_count());

    let engine: Arc<dyn ExecutionEngine> = if args.execute {
        Arc::new(PythonEngine::new().interpreter(&args.python))
    } else {
        Arc::new(lex_eda::DryRunEngine)
    };
    let mut builder = Exporter::builder().engine(engine);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let policy = if args.fail_fast {
        ExecutionPolicy::FailFast
    } else {
        ExecutionPolicy::ContinueOnError
    };

    match builder.build().export_to(&document, format, policy, &output) {
        Ok(artifact) => handle_output(&artifact, &output, &args),
        Err(e) => fail(&args, e),
    }
}

fn resolve_format(args: &Args) -> TargetFormat {
    if let Some(format) = args.format {
        return format.into();
    }
    args.output
        .as_deref()
        .and_then(|o| Path::new(o).extension())
        .and_then(|ext| ext.to_str())
        .and_then(TargetFormat::from_extension)
        .unwrap_or_default()
}

fn build_report(args: &Args, dataset: DatasetHandle) -> Result<Report> {
    let mut definition = match &args.definition {
        Some(path) => {
            info!("Loading report definition from: {}", path);
            Some(ReportDefinition::from_path(path)?)
        }
        None => None,
    };

    // Command-line flags take precedence over the definition file.
    if let Some(def) = definition.as_mut() {
        if let Some(title) = &args.title {
            def.title = Some(title.clone());
        }
        if let Some(verbosity) = args.verbosity {
            def.verbosity = Some(verbosity.into());
        }
    }

    let dataset_name = definition
        .as_ref()
        .and_then(|d| d.config.get_str("dataset_name"))
        .unwrap_or("df")
        .to_string();

    let mut config = ReportConfig::builder()
        .dataset_name(&dataset_name)
        .load_code(load_code(&args.input, &dataset_name));
    if let Some(title) = &args.title {
        config = config.title(title);
    }
    if let Some(verbosity) = args.verbosity {
        config = config.verbosity(verbosity.into());
    }
    let config = config.build()?;

    match definition {
        Some(definition) => definition.into_report(dataset, config).map_err(|e| {
            if let lex_eda::DefinitionError::Build(build) = &e {
                for failure in &build.errors {
                    error!("{}", failure);
                }
            }
            anyhow!(e)
        }),
        None => {
            debug!("Using default sections");
            Ok(Report::default_sections(dataset, config))
        }
    }
}

/// Notebook code that loads the input into `dataset_name`.
fn load_code(input: &str, dataset_name: &str) -> String {
    let reader = if is_parquet(input) {
        "read_parquet"
    } else {
        "read_csv"
    };
    format!("{} = pd.{}({})", dataset_name, reader, py_str(input))
}

fn is_parquet(path: &str) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("parquet"))
}

fn load_dataset(path: &str) -> Result<DataFrame> {
    if is_parquet(path) {
        let file = File::open(path).with_context(|| format!("Could not open {}", path))?;
        return Ok(ParquetReader::new(file).finish()?);
    }
    CsvReadOptions::default()
        .with_infer_schema_length(Some(100))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
        .map_err(|e| anyhow!("Failed to read {}: {}", path, e))
}

/// Extract the file stem (name without extension) from a path.
fn file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("report")
        .to_string()
}

/// Report a failed export and exit non-zero.
fn fail(args: &Args, e: ExportError) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(&e)?);
    }
    if let ExportError::Execution { partial, .. } = &e {
        warn!("{} of the cells ran before the failure", partial.len());
    }
    Err(anyhow!("Export failed [{}]: {}", e.error_code(), e))
}

/// Print the manifest as JSON or a human-readable summary.
///
/// Partial success is not an error: the artifact was written and the
/// failed cells are listed.
fn handle_output(artifact: &Artifact, output: &Path, args: &Args) -> Result<()> {
    let manifest = &artifact.manifest;

    if args.json {
        println!("{}", serde_json::to_string_pretty(manifest)?);
        return Ok(());
    }

    for failure in &manifest.failures {
        warn!(
            "Cell {} ({}) raised {}: {}",
            failure.index, failure.section, failure.ename, failure.evalue
        );
    }

    println!();
    println!("{}", "=".repeat(80));
    println!("EDA REPORT COMPLETE");
    println!("{}", "=".repeat(80));
    println!();
    println!("Title:  {}", manifest.title);
    println!("Input:  {}", args.input);
    println!(
        "Output: {} ({}, {} bytes)",
        output.display(),
        manifest.format,
        artifact.bytes.len()
    );
    println!();
    println!("Cells:  {} total, {} code", manifest.cells_total, manifest.cells_executed);
    println!("Engine: {}", manifest.engine);
    println!("Status: {:?}", manifest.status);

    if !manifest.failures.is_empty() {
        println!();
        println!("Failed Cells:");
        for failure in &manifest.failures {
            println!(
                "  ! [{}] {}: {}: {}",
                failure.index, failure.section, failure.ename, failure.evalue
            );
        }
    }

    println!();
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
    Ok(())
}
