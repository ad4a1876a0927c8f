//! # JWST Catalog CLI (`jwscan`)
//!
//! ## Usage
//!
//! ```bash
//! jwscan --config ./config/jwscan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jwscan init` | Create the catalog database and its tables |
//! | `jwscan scan [--root DIR] [--dry-run]` | Scan, decode, resolve and store |
//! | `jwscan decode <FILENAME>...` | Decode filenames, print JSON |
//! | `jwscan get <FILENAME>` | Show a stored product |
//! | `jwscan programs` | List programs in the catalog |
//! | `jwscan stats` | Catalog and last-scan summary |
//! | `jwscan export [--program ID] [--output FILE]` | Dump the catalog as JSON |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use jwst_catalog::config::{self, LogConfig};
use jwst_catalog::{decode_cmd, export, get, ingest, migrate, stats};

/// JWST pipeline output cataloguer.
///
/// All commands except `decode` read a TOML configuration file given by
/// `--config`.
#[derive(Parser)]
#[command(
    name = "jwscan",
    about = "Catalog JWST pipeline products and associations by program",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/jwscan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalog database schema. Safe to run repeatedly.
    Init,

    /// Scan a directory and rebuild the catalog from it.
    Scan {
        /// Directory to scan. Overrides `scan.root` from the config.
        #[arg(long)]
        root: Option<PathBuf>,

        /// Decode and resolve, print counts, write nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Decode filenames and print one JSON line per name.
    ///
    /// Names ending in `.json` are read as association manifests.
    Decode {
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Show a stored product and its association.
    Get {
        /// Product filename.
        filename: String,
    },

    /// List programs with product and association counts.
    Programs,

    /// Show catalog statistics and the last scan run.
    Stats,

    /// Export the catalog as JSON.
    Export {
        /// Only export this program.
        #[arg(long)]
        program: Option<String>,

        /// Write to a file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Log to stderr, and to `log.file` when set. `RUST_LOG` beats `log.level`.
fn init_logging(log: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .with_context(|| format!("Invalid log level: {}", log.level))?;

    let file_layer = match &log.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Decode { names } = &cli.command {
        init_logging(&LogConfig::default())?;
        return decode_cmd::run_decode(names);
    }

    let cfg = config::load_config(&cli.config)?;
    init_logging(&cfg.log)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Scan { root, dry_run } => {
            ingest::run_scan(&cfg, root, dry_run).await?;
        }
        Commands::Get { filename } => {
            get::run_get(&cfg, &filename).await?;
        }
        Commands::Programs => {
            stats::run_programs(&cfg).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { program, output } => {
            export::run_export(&cfg, program.as_deref(), output.as_deref()).await?;
        }
        Commands::Decode { .. } => unreachable!("handled before config loading"),
    }

    Ok(())
}
