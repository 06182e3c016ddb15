//! Annorecon: temporal reconciliation of image annotation snapshots.
//!
//! An annotation project is annotated task by task; an image may be touched
//! by several tasks over time and may be deleted. Annorecon works out which
//! records describe the current state of each image, and merges two current
//! states taken at different times into one.
//!
//! # Modules
//!
//! - [`record`]: Record model (annotation records, deletions, snapshots) and CSV persistence
//! - [`partition`]: Splits a project's records into current, obsolete, in-progress and deleted
//! - [`merge`]: Merges an older and a newer snapshot, propagating dataset splits
//! - [`error`]: Error types for annorecon operations

pub mod error;
pub mod merge;
pub mod partition;
pub mod record;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

pub use error::AnnoreconError;

use record::io_csv::{self, ReadOptions};

/// File names written by `annorecon partition` into its output directory.
pub const DATASET_FILE: &str = "dataset.csv";
pub const OBSOLETE_FILE: &str = "obsolete.csv";
pub const IN_PROGRESS_FILE: &str = "in_progress.csv";
pub const DELETED_FILE: &str = "deleted.txt";

/// The annorecon CLI application.
#[derive(Parser)]
#[command(name = "annorecon")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Log filter directives (for example 'annorecon=debug').
    #[arg(long, global = true, env = "ANNORECON_LOG")]
    log: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Partition a raw record table into current, obsolete, in-progress and deleted.
    Partition(PartitionArgs),
    /// Merge an older and a newer snapshot into one.
    Merge(MergeArgs),
}

/// Arguments for the partition subcommand.
#[derive(clap::Args)]
struct PartitionArgs {
    /// Raw record table (CSV) with records and deletion rows of every task.
    input: PathBuf,

    /// Directory to write dataset.csv, obsolete.csv, in_progress.csv and deleted.txt to.
    #[arg(short = 'o', long)]
    output_dir: PathBuf,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    report: String,
}

/// Arguments for the merge subcommand.
#[derive(clap::Args)]
struct MergeArgs {
    /// Older snapshot (CSV).
    #[arg(long)]
    old: PathBuf,

    /// Newer snapshot (CSV).
    #[arg(long)]
    new: PathBuf,

    /// Deleted-image list, one image name per line.
    #[arg(long)]
    deleted: Option<PathBuf>,

    /// Resolve images present in both snapshots by task_updated_date.
    #[arg(long)]
    by_time: bool,

    /// Output snapshot file (CSV).
    #[arg(short = 'o', long)]
    output: PathBuf,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    report: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    fn parse(value: &str) -> Result<Self, AnnoreconError> {
        match value {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(AnnoreconError::UnsupportedFormat(format!(
                "report format '{}' (supported: text, json)",
                other
            ))),
        }
    }

    fn print<R: Serialize + std::fmt::Display>(self, report: &R) -> Result<(), AnnoreconError> {
        match self {
            ReportFormat::Text => print!("{}", report),
            ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        }
        Ok(())
    }
}

/// Run the annorecon CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`. It also
/// installs the stderr log subscriber.
pub fn run() -> Result<(), AnnoreconError> {
    let cli = Cli::parse();
    init_tracing(cli.log.as_deref());

    match cli.command {
        Some(Commands::Partition(args)) => run_partition(args),
        Some(Commands::Merge(args)) => run_merge(args),
        None => {
            println!("annorecon {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Temporal reconciliation of image annotation snapshots.");
            println!();
            println!("Run 'annorecon --help' for usage information.");
            Ok(())
        }
    }
}

/// Logs go to stderr so reports on stdout stay machine-readable.
fn init_tracing(directives: Option<&str>) {
    let filter = match directives {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("annorecon=info")),
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Execute the partition subcommand.
fn run_partition(args: PartitionArgs) -> Result<(), AnnoreconError> {
    let format = ReportFormat::parse(&args.report)?;

    let opts = ReadOptions {
        require_time_column: true,
    };
    let project = io_csv::read_record_table_csv(&args.input, &opts)?;
    tracing::info!(
        "Read {} record(s) and {} deletion(s) from {}",
        project.records.len(),
        project.deletions.len(),
        args.input.display()
    );

    let result = partition::partition_project(project)?;

    create_dir(&args.output_dir)?;
    io_csv::write_records_csv(&args.output_dir.join(DATASET_FILE), &result.current)?;
    io_csv::write_records_csv(&args.output_dir.join(OBSOLETE_FILE), &result.obsolete)?;
    io_csv::write_records_csv(&args.output_dir.join(IN_PROGRESS_FILE), &result.in_progress)?;
    io_csv::write_deleted_txt(&args.output_dir.join(DELETED_FILE), result.deleted_names())?;
    tracing::info!("Wrote partition to {}", args.output_dir.display());

    format.print(&result.report())
}

/// Execute the merge subcommand.
fn run_merge(args: MergeArgs) -> Result<(), AnnoreconError> {
    let format = ReportFormat::parse(&args.report)?;

    let opts = ReadOptions {
        require_time_column: args.by_time,
    };
    let old = io_csv::read_snapshot_csv(&args.old, &opts)?;
    let new = io_csv::read_snapshot_csv(&args.new, &opts)?;
    let deleted = match &args.deleted {
        Some(path) => io_csv::read_deleted_txt(path)?,
        None => Default::default(),
    };
    tracing::info!(
        "Merging {} old row(s) with {} new row(s), {} deleted image(s)",
        old.len(),
        new.len(),
        deleted.len()
    );

    let merge_opts = merge::MergeOptions {
        by_time: args.by_time,
    };
    let outcome = merge::merge(&old, &new, &deleted, &merge_opts)?;

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        create_dir(parent)?;
    }
    io_csv::write_snapshot_csv(&args.output, &outcome.snapshot)?;
    tracing::info!("Wrote merged snapshot to {}", args.output.display());

    format.print(&outcome.report)
}

fn create_dir(path: &Path) -> Result<(), AnnoreconError> {
    fs::create_dir_all(path).map_err(|source| AnnoreconError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}
