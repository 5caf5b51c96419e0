//! dicomcat - Incremental DICOM catalog
//!
//! Keeps a JSON index file in every directory of a DICOM archive, holding
//! name, size, modification time and DICOM metadata of each file. Updates
//! re-read only files whose size or modification time changed and carry
//! metadata over to renamed files; a read-only verify pass checks that
//! every index still matches the disk.

pub mod catalog;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::catalog::{CatalogConfig, Indexer, Mode};
use crate::cli::{Cli, Commands, OutputFormat, WalkArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::output::JsonOutput;
use crate::progress::Progress;

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns an error when configuration cannot be loaded or when the run
/// ends early; see [`ExitCode::for_error`] for the exit code mapping.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Update(args) => {
            let config = config.with_update_args(&args);
            log::debug!("Effective configuration: {:?}", config);
            let catalog_config = config.to_catalog_config().with_force(args.force);
            run_catalog(Mode::Update, &args.path, &args.walk, catalog_config, cli.quiet)
        }
        Commands::Verify(args) => {
            let config = config.with_walk_args(&args.walk);
            log::debug!("Effective configuration: {:?}", config);
            run_catalog(
                Mode::Verify,
                &args.path,
                &args.walk,
                config.to_catalog_config(),
                cli.quiet,
            )
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(ExitCode::Success)
        }
    }
}

fn run_catalog(
    mode: Mode,
    root: &Path,
    walk: &WalkArgs,
    mut catalog_config: CatalogConfig,
    quiet: bool,
) -> Result<ExitCode> {
    let handler = signal::install_handler()?;
    catalog_config = catalog_config.with_shutdown_flag(handler.get_flag());

    let show_progress = !quiet
        && !walk.no_progress
        && walk.output == OutputFormat::Text
        && std::io::stderr().is_terminal();
    if show_progress {
        catalog_config = catalog_config.with_progress_callback(Arc::new(Progress::new(false)));
    }

    let command = match mode {
        Mode::Update => "update",
        Mode::Verify => "verify",
    };
    let catalog = Indexer::with_defaults(catalog_config)
        .run(root, mode)
        .with_context(|| format!("{} {}", command, root.display()))?;

    let stats = &catalog.stats;
    let exit_code = if stats.interrupted {
        ExitCode::Interrupted
    } else if stats.has_failures() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    };

    match walk.output {
        OutputFormat::Json => {
            let output = JsonOutput::new(command, root, stats, exit_code);
            output
                .write_to(&mut std::io::stdout().lock(), true)
                .context("Failed to write JSON summary")?;
        }
        OutputFormat::Text => {
            if !quiet {
                println!("{}", stats);
                for failure in &stats.failures {
                    println!("  failed: {}: {}", failure.path.display(), failure.message);
                }
            }
        }
    }
    Ok(exit_code)
}
