//! `tseda` command line: one analyzer or store operation per invocation.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use tseda::config::EdaConfig;
use tseda::eda::{AnalyzerOptions, DatasetAnalyzer};
use tseda::store::{check_upload_size, ConflictMode, DatasetStore};
use tseda::time_series::DecompositionMethod;
use tseda::vis::{encode_base64, DecompositionRenderer, PlottersPngRenderer};
use tseda::Result;

#[derive(Debug, Parser)]
#[command(name = "tseda", version, about = "Explore and clean delimited time-series datasets")]
struct Cli {
    /// YAML or TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConflictArg {
    Error,
    Overwrite,
    Increment,
}

impl From<ConflictArg> for ConflictMode {
    fn from(v: ConflictArg) -> Self {
        match v {
            ConflictArg::Error => ConflictMode::Error,
            ConflictArg::Overwrite => ConflictMode::Overwrite,
            ConflictArg::Increment => ConflictMode::Increment,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Shape, columns, dtypes and null counts
    Basic { file: PathBuf },

    /// Per-column dtype, null, non-null and unique counts
    Schema { file: PathBuf },

    /// Suggested cast type for every column
    SuggestTypes { file: PathBuf },

    /// Suggested cast type for one column
    SuggestCast { file: PathBuf, column: String },

    /// Most frequent values of a column
    ValueCounts {
        file: PathBuf,
        column: String,
        #[arg(long = "top-n")]
        top_n: Option<usize>,
    },

    /// Null count of a column
    ColumnNulls { file: PathBuf, column: String },

    /// Cast a column, only when every row converts
    TryCast {
        file: PathBuf,
        column: String,
        dtype: String,
    },

    /// Drop the rows whose value cannot be cast
    DropNonConvertible {
        file: PathBuf,
        column: String,
        dtype: String,
    },

    /// Remove a column
    DropColumn { file: PathBuf, column: String },

    /// Drop rows with a null in a column
    DropRowsWithNull { file: PathBuf, column: String },

    /// Check whether a column parses as datetimes
    CheckDatetime { file: PathBuf, column: String },

    /// Check whether a frequency fits the sampling of a datetime column
    CheckFrequency {
        file: PathBuf,
        column: String,
        freq: String,
    },

    /// Resample on a datetime column and print the first buckets
    PreviewResample {
        file: PathBuf,
        column: String,
        freq: String,
        #[arg(long)]
        agg: Option<String>,
        #[arg(long)]
        rows: Option<usize>,
    },

    /// Seasonal decomposition chart as base64 PNG
    Decompose {
        file: PathBuf,
        datetime: String,
        target: String,
        #[arg(long)]
        period: Option<usize>,
        /// stl or classical
        #[arg(long, default_value = "stl")]
        method: String,
        /// Also write the decoded PNG here
        #[arg(long)]
        png: Option<PathBuf>,
    },

    /// Parse and re-export the table, optionally after dropping columns
    Export {
        file: PathBuf,
        /// Columns removed before export
        #[arg(long = "drop")]
        drop: Vec<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Check that a file is within the upload size limit
    CheckFile { file: PathBuf },

    /// Copy a file into the dataset store
    Save {
        file: PathBuf,
        /// Stored name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
        #[arg(long, value_enum, default_value = "error")]
        on_conflict: ConflictArg,
    },

    /// Delete a stored dataset
    Delete { name: String },

    /// Rename a stored dataset
    Rename { old: String, new: String },

    /// List stored datasets
    List,
}

#[derive(Serialize)]
struct Message {
    success: bool,
    message: String,
}

impl Message {
    fn ok(message: String) -> Self {
        Self {
            success: true,
            message,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn read_payload(path: &Path, config: &EdaConfig) -> Result<Vec<u8>> {
    let bytes = fs::read(path)?;
    check_upload_size(&bytes, config.store.max_upload_mb)?;
    Ok(bytes)
}

fn open(path: &Path, config: &EdaConfig) -> Result<DatasetAnalyzer> {
    let bytes = read_payload(path, config)?;
    DatasetAnalyzer::with_options(&bytes, &file_name(path), AnalyzerOptions::from_config(config)?)
}

fn run(cli: Cli, config: EdaConfig) -> Result<()> {
    match cli.cmd {
        Command::Basic { file } => print_json(&open(&file, &config)?.basic_info()),
        Command::Schema { file } => print_json(&open(&file, &config)?.schema_overview()),
        Command::SuggestTypes { file } => {
            print_json(&open(&file, &config)?.suggest_types_for_all())
        }
        Command::SuggestCast { file, column } => {
            print_json(&open(&file, &config)?.suggest_cast_type(&column)?)
        }
        Command::ValueCounts {
            file,
            column,
            top_n,
        } => print_json(&open(&file, &config)?.column_value_counts(&column, top_n)?),
        Command::ColumnNulls { file, column } => {
            print_json(&open(&file, &config)?.column_nulls(&column)?)
        }
        Command::TryCast {
            file,
            column,
            dtype,
        } => print_json(&open(&file, &config)?.try_cast_column(&column, &dtype)?),
        Command::DropNonConvertible {
            file,
            column,
            dtype,
        } => print_json(&open(&file, &config)?.drop_non_convertible_rows(&column, &dtype)?),
        Command::DropColumn { file, column } => {
            print_json(&open(&file, &config)?.drop_column(&column)?)
        }
        Command::DropRowsWithNull { file, column } => {
            print_json(&open(&file, &config)?.drop_rows_with_null(&column)?)
        }
        Command::CheckDatetime { file, column } => {
            print_json(&open(&file, &config)?.check_datetime_column(&column)?)
        }
        Command::CheckFrequency { file, column, freq } => {
            print_json(&open(&file, &config)?.check_frequency_applicability(&column, &freq)?)
        }
        Command::PreviewResample {
            file,
            column,
            freq,
            agg,
            rows,
        } => {
            let mut analyzer = open(&file, &config)?;
            print_json(&analyzer.preview_resample(&column, &freq, agg.as_deref(), rows)?)
        }
        Command::Decompose {
            file,
            datetime,
            target,
            period,
            method,
            png,
        } => {
            let method: DecompositionMethod = method.parse()?;
            let mut analyzer = open(&file, &config)?;
            let (timestamps, decomposition) = analyzer.decompose_series(
                &datetime,
                &target,
                period,
                method.decomposer().as_ref(),
            )?;
            let image = PlottersPngRenderer::new(analyzer.options().plot.clone())
                .render(&timestamps, &decomposition)?;
            if let Some(path) = png {
                fs::write(&path, &image)?;
            }
            print_json(&serde_json::json!({
                "method": method.to_string(),
                "period": decomposition.period,
                "metrics": decomposition.metrics(),
                "image": encode_base64(&image),
            }))
        }
        Command::Export { file, drop, output } => {
            let mut analyzer = open(&file, &config)?;
            for column in &drop {
                analyzer.drop_column(column)?;
            }
            let bytes = analyzer.save_cleaned_csv()?;
            match output {
                Some(path) => fs::write(path, bytes)?,
                None => std::io::stdout().write_all(&bytes)?,
            }
            Ok(())
        }
        Command::CheckFile { file } => {
            let bytes = fs::read(&file)?;
            check_upload_size(&bytes, config.store.max_upload_mb)?;
            print_json(&Message::ok(format!(
                "File size of {} bytes is within the {} MB limit.",
                bytes.len(),
                config.store.max_upload_mb
            )))
        }
        Command::Save {
            file,
            name,
            on_conflict,
        } => {
            let bytes = read_payload(&file, &config)?;
            let store = DatasetStore::new(&config.store.data_dir)?;
            let name = name.unwrap_or_else(|| file_name(&file));
            let path = store.save(&name, &bytes, on_conflict.into())?;
            print_json(&Message::ok(format!("Saved to {}.", path.display())))
        }
        Command::Delete { name } => {
            DatasetStore::new(&config.store.data_dir)?.delete(&name)?;
            print_json(&Message::ok(format!("File '{}' deleted.", name)))
        }
        Command::Rename { old, new } => {
            DatasetStore::new(&config.store.data_dir)?.rename(&old, &new)?;
            print_json(&Message::ok(format!("File '{}' renamed to '{}'.", old, new)))
        }
        Command::List => print_json(&DatasetStore::new(&config.store.data_dir)?.list_datasets()?),
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match EdaConfig::load_with_precedence(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::new()
        .parse_filters(&config.logging.level)
        .init();

    if let Err(e) = run(cli, config) {
        if !e.is_client_error() {
            log::error!("{:?}", e);
        }
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}
