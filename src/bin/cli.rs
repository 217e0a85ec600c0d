//! docdrift CLI
//!
//! Local execution entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use docdrift::{
    error::Result,
    filters::FilterRegistry,
    models::{Config, ReconciliationRecord},
    pipeline::{self, CheckSummary},
};

/// docdrift - External documentation drift checker
#[derive(Parser, Debug)]
#[command(
    name = "docdrift",
    version,
    about = "Detects changes in external documentation referenced from source comments"
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "docdrift.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check every annotation under the given paths
    Check {
        /// Files or directories to scan (default: current directory)
        paths: Vec<PathBuf>,

        /// Report only, never rewrite source files
        #[arg(long)]
        no_update: bool,

        /// Write filtered page snapshots to this directory
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,

        /// Print records as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration file
    Validate,

    /// List available content filters
    Filters,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn status(record: &ReconciliationRecord) -> &'static str {
    if !record.checked {
        "ERROR"
    } else if record.matches {
        "OK"
    } else {
        "CHANGED"
    }
}

fn print_summary(summary: &CheckSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&summary.records)?);
        return Ok(());
    }

    for record in &summary.records {
        println!(
            "{:<8} {} {} {{{}}} -> {{{}}}",
            status(record),
            record.location,
            record.external_source,
            record.saved_fingerprint,
            record.current_fingerprint
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Check {
            paths,
            no_update,
            snapshot_dir,
            json,
        } => {
            let mut config = Config::load_or_default(&cli.config);
            if no_update {
                config.reconcile.update_files = false;
            }
            if snapshot_dir.is_some() {
                config.reconcile.snapshot_dir = snapshot_dir;
            }
            let roots = if paths.is_empty() {
                vec![PathBuf::from(".")]
            } else {
                paths
            };

            let summary = pipeline::run_check(&config, &roots).await?;
            print_summary(&summary, json)?;

            if !summary.is_clean() {
                log::warn!(
                    "{} changed, {} unreachable, {} files failed",
                    summary.mismatches().count(),
                    summary.errors().count(),
                    summary.files_failed
                );
                std::process::exit(1);
            }
        }

        Command::Validate => {
            log::info!("Validating {}...", cli.config.display());

            if let Err(e) = Config::load_validated(&cli.config) {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");
        }

        Command::Filters => {
            for name in FilterRegistry::with_builtin().names() {
                println!("{name}");
            }
        }
    }

    Ok(())
}
