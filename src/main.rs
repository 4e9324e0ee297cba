mod config;
mod descriptor;
mod error;
mod grouper;
mod inventory;
mod matcher;
mod merger;
mod reconcile;
mod remover;
mod report;
mod resolver;
mod walker;
mod writer;

use crate::config::AppConfig;
use crate::reconcile::RunMode;
use crate::report::LogReporter;
use crate::writer::MetadataWriter;
use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "takeout_reconciler", version, about = "Reconcile overlapping photo exports")]
struct Cli {
    /// Log level (overrides configuration)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Descriptor lookup threads (overrides configuration)
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Find files in the candidate tree that duplicate the reference tree
    Dedupe {
        /// Authoritative tree, e.g. the album export
        #[arg(short, long, value_name = "DIR")]
        reference: Option<PathBuf>,
        /// Tree to clean up, e.g. the flat export
        #[arg(short, long, value_name = "DIR")]
        candidate: Option<PathBuf>,
        /// Delete matched duplicates and their descriptors
        #[arg(long)]
        remove: bool,
    },

    /// Embed descriptor metadata into media files
    Merge {
        #[arg(short, long, value_name = "DIR")]
        media: Option<PathBuf>,
        /// Where updated files are moved to
        #[arg(short, long, value_name = "DIR")]
        processed: Option<PathBuf>,
    },

    /// Count media files and extensions in both trees
    Inventory {
        #[arg(short, long, value_name = "DIR")]
        reference: Option<PathBuf>,
        #[arg(short, long, value_name = "DIR")]
        candidate: Option<PathBuf>,
    },
}

fn required(arg: Option<PathBuf>, configured: &Option<PathBuf>, name: &str) -> Result<PathBuf> {
    match arg.or_else(|| configured.clone()) {
        Some(path) => Ok(path),
        None => bail!("No {} given on the command line or in configuration", name),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::new()?;
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(workers) = cli.workers {
        config.num_workers = workers;
    }

    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    info!("Starting takeout_reconciler");
    let reporter = LogReporter;

    match cli.command {
        Commands::Dedupe {
            reference,
            candidate,
            remove,
        } => {
            let reference = required(reference, &config.reference_directory, "reference directory")?;
            let candidate = required(candidate, &config.candidate_directory, "candidate directory")?;
            let mode = if remove {
                RunMode::MatchAndRemove
            } else {
                RunMode::MatchOnly
            };

            let (matches, summary) =
                reconcile::run(&reference, &candidate, mode, config.num_workers, &reporter)?;

            for m in matches.matches() {
                println!("[{}] {} -> {}", m.key, m.reference.display(), m.candidate.display());
            }
            println!("{}", summary);
            if mode == RunMode::MatchOnly && !matches.is_empty() {
                println!("Match only; re-run with --remove to delete {} files.", matches.paths().len());
            }
        }

        Commands::Merge { media, processed } => {
            let media = required(media, &config.media_directory, "media directory")?;
            let processed = required(processed, &config.processed_directory, "processed directory")?;
            let writer = MetadataWriter::from_config(&config);
            writer.check_tools()?;

            let stats = merger::merge(&writer, &media, &processed, &reporter)?;
            let updated: usize = stats.iter().map(|s| s.updated).sum();
            let unprocessed: usize = stats.iter().map(|s| s.unprocessed).sum();
            println!(
                "{} directories: {} files updated, {} unprocessed",
                stats.len(),
                updated,
                unprocessed
            );
        }

        Commands::Inventory {
            reference,
            candidate,
        } => {
            let reference = required(reference, &config.reference_directory, "reference directory")?;
            let candidate = required(candidate, &config.candidate_directory, "candidate directory")?;
            let reference_inv = inventory::inventory(&reference)?;
            let candidate_inv = inventory::inventory(&candidate)?;

            for (label, inv) in [("reference", &reference_inv), ("candidate", &candidate_inv)] {
                println!(
                    "{}: {} files ({} with embedded capture date)",
                    label, inv.total_files, inv.embedded_capture_dates
                );
                for (ext, count) in &inv.extensions {
                    println!("  .{:<6} {}", ext, count);
                }
                for dir in &inv.unreadable {
                    println!("  unreadable: {}", dir.display());
                }
            }
            println!(
                "diff: {}",
                candidate_inv.total_files as i64 - reference_inv.total_files as i64
            );
        }
    }

    info!("takeout_reconciler finished");
    Ok(())
}
