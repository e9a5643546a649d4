//! Sleuth CLI - duplicate detection and fraud scoring for documents and images.

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use sleuth_core::{HashAlgorithm, Severity};
use tracing_subscriber::EnvFilter;

mod commands;
mod exit_codes;
mod utils;

use exit_codes::ExitCode;

const EXIT_CODES_HELP: &str = "\
Exit codes:
  0   Success
  1   General error
  64  Usage error (invalid arguments)
  65  Fraud severity reached the --fail-on threshold
  66  Input file missing, unreadable or not a decodable image
  69  Embedding service unavailable
  74  Data directory could not be read or written
  78  Invalid configuration (SLEUTH_* variables, mismatched data directory)";

#[derive(Parser)]
#[command(name = "sleuth")]
#[command(author, version, about = "Duplicate detection and fraud scoring for documents and images", long_about = None)]
#[command(after_help = EXIT_CODES_HELP)]
struct Cli {
    /// Data directory for the persisted indexes (default: $SLEUTH_DATA_DIR or ./.sleuth)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every forensic signal on a file and register it for future duplicate checks
    Scan {
        /// Path to the document or image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Use this text instead of extracting it from the file
        #[arg(long)]
        text: Option<String>,

        /// Print the full report as JSON
        #[arg(long)]
        json: bool,

        /// Exit with code 65 when the severity is at or above this level
        #[arg(long, value_enum, value_name = "SEVERITY")]
        fail_on: Option<FailOn>,
    },

    /// Look up duplicates of a file without registering it
    Query {
        /// Path to the document or image
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Use this text instead of extracting it from the file
        #[arg(long)]
        text: Option<String>,

        /// Largest Hamming distance that counts as a near-duplicate image
        #[arg(long, value_name = "BITS")]
        max_distance: Option<u32>,

        /// Print the verdict as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the perceptual hash of an image
    Hash {
        /// Path to the image
        #[arg(value_name = "IMAGE")]
        image: PathBuf,

        /// Hash algorithm (blockhash, phash)
        #[arg(short, long, default_value = "blockhash")]
        algorithm: HashAlgorithm,

        /// Print the hash as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show index sizes and engine settings
    Stats {
        /// Print the statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Severity threshold accepted by `--fail-on`.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FailOn {
    Low,
    Medium,
    High,
}

impl From<FailOn> for Severity {
    fn from(value: FailOn) -> Self {
        match value {
            FailOn::Low => Severity::Low,
            FailOn::Medium => Severity::Medium,
            FailOn::High => Severity::High,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "sleuth_cli=debug,sleuth_core=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let data_dir = cli.data_dir;
    let quiet = cli.quiet;

    match cli.command {
        Commands::Scan {
            file,
            text,
            json,
            fail_on,
        } => {
            commands::scan::execute(file, text, data_dir, json, fail_on.map(Into::into), quiet)
                .await
        }
        Commands::Query {
            file,
            text,
            max_distance,
            json,
        } => commands::query::execute(file, text, data_dir, max_distance, json, quiet).await,
        Commands::Hash {
            image,
            algorithm,
            json,
        } => commands::hash::execute(image, algorithm, json, quiet),
        Commands::Stats { json } => commands::stats::execute(data_dir, json, quiet),
    }
}

#[tokio::main]
async fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // --help and --version come through here too, on stdout
            let code = if e.use_stderr() {
                exit_codes::USAGE_ERROR
            } else {
                exit_codes::SUCCESS
            };
            let _ = e.print();
            process::exit(code);
        }
    };

    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let exit = ExitCode::from_anyhow(&err);
        eprintln!("{} {}", "error:".red().bold(), exit.message);
        process::exit(exit.code);
    }
}
