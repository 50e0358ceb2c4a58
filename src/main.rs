//! # lexchunk CLI
//!
//! The `lexchunk` binary drives the legal document pipeline: it scans the
//! configured pillar directories, extracts and cleans text (falling back to
//! OCR for scanned PDFs), chunks it, and writes one JSONL file per pillar.
//!
//! ## Usage
//!
//! ```bash
//! lexchunk --config ./config/lexchunk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `lexchunk pillars` | List configured pillars and their file counts |
//! | `lexchunk process <pillar>` | Process one pillar into its JSONL output |
//! | `lexchunk process all` | Process every configured pillar |
//! | `lexchunk inspect <path>` | Process a single file and print the result |
//!
//! ## Examples
//!
//! ```bash
//! # See what would be processed
//! lexchunk process cases --dry-run
//!
//! # Process the first 20 statutes with JSON progress on stderr
//! lexchunk process statutes --limit 20 --progress json
//!
//! # Dump the chunks of one scanned opinion as JSONL
//! lexchunk inspect data/cases/opinion.pdf --pillar cases --json
//! ```

use anyhow::bail;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use lexchunk::progress::ProgressMode;
use lexchunk::{config, inspect, pipeline, stats};

/// lexchunk: turn legal PDFs and statute files into chunked JSONL.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/lexchunk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "lexchunk",
    about = "Legal document normalization: PDFs and statutes to chunked JSONL",
    version,
    long_about = "lexchunk extracts text from legal PDFs (with OCR fallback for scanned pages) \
    and structured statute files (JSON or XML), cleans and chunks it with section awareness, \
    and writes one JSONL record per chunk for downstream retrieval systems."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/lexchunk.toml`. Chunking, OCR, tracking and
    /// pillar settings are read from this file.
    #[arg(long, global = true, default_value = "./config/lexchunk.toml")]
    config: PathBuf,

    /// Enable debug logging (overridden by `RUST_LOG`).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Process a pillar into its JSONL output.
    ///
    /// Every matching file in the pillar's input directory is extracted,
    /// cleaned, and chunked. Files that fail are listed in the run summary
    /// and do not stop the run.
    Process {
        /// Pillar name from the config, or `all`.
        pillar: String,

        /// Maximum number of documents to process per pillar.
        #[arg(long)]
        limit: Option<usize>,

        /// Dry run: count documents without writing any output.
        #[arg(long)]
        dry_run: bool,

        /// Progress output on stderr: `auto`, `human`, `json`, or `off`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Process a single file and print its chunks.
    ///
    /// Nothing is written to disk. Useful for debugging extraction and
    /// section detection on one document.
    Inspect {
        /// Path to a PDF, statute JSON, or statute XML file.
        path: PathBuf,

        /// Use this pillar's label for the chunk metadata.
        #[arg(long)]
        pillar: Option<String>,

        /// Print JSONL records instead of the human-readable summary.
        #[arg(long)]
        json: bool,
    },

    /// List configured pillars.
    Pillars,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_progress(value: &str) -> anyhow::Result<ProgressMode> {
    match value {
        "auto" => Ok(ProgressMode::default_for_tty()),
        "human" => Ok(ProgressMode::Human),
        "json" => Ok(ProgressMode::Json),
        "off" => Ok(ProgressMode::Off),
        other => bail!(
            "Unknown progress mode: '{}'. Use auto, human, json, or off.",
            other
        ),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Process {
            pillar,
            limit,
            dry_run,
            progress,
        } => {
            let opts = pipeline::ProcessOptions {
                limit,
                dry_run,
                progress: parse_progress(&progress)?,
            };
            pipeline::run_process(&cfg, &pillar, &opts)?;
        }
        Commands::Inspect { path, pillar, json } => {
            inspect::run_inspect(&cfg, &path, pillar.as_deref(), json)?;
        }
        Commands::Pillars => {
            stats::run_pillars(&cfg)?;
        }
    }

    Ok(())
}
