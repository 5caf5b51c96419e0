//! Command-line interface definitions for dicomcat.
//!
//! Global options (verbosity, color, config file) come first, then a
//! subcommand. Options left unset on the command line fall back to the
//! environment and the config file, see [`crate::config`].
//!
//! # Example
//!
//! ```bash
//! # Bring every index under an archive up to date
//! dicomcat update /archive
//!
//! # Only write the plain layout, stop at the first failing directory
//! dicomcat update /archive --write-mode plain --fail-fast
//!
//! # Check that nothing changed since the last update, JSON summary on stdout
//! dicomcat verify /archive --output json
//!
//! # Show the effective configuration
//! dicomcat config
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::codec::WriteMode;

/// Incremental per-directory catalog of DICOM archives.
///
/// dicomcat keeps a small JSON index next to the files of every directory,
/// holding the name, size, modification time and DICOM metadata of each file.
/// Updates only re-read files whose size or modification time changed.
#[derive(Debug, Parser)]
#[command(name = "dicomcat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: platform config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Bring the index of every directory under PATH up to date
    Update(UpdateArgs),
    /// Check, without writing, that every index under PATH matches the disk
    Verify(VerifyArgs),
    /// Print the effective configuration as TOML
    Config,
}

/// Options shared by `update` and `verify`.
#[derive(Debug, Args)]
pub struct WalkArgs {
    /// Number of worker threads (default: 4)
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Follow symbolic links during the walk
    ///
    /// Warning: May cause infinite loops if symlinks form cycles.
    #[arg(long, overrides_with = "no_follow_symlinks")]
    pub follow_symlinks: bool,

    /// Do not follow symbolic links, even if configured
    #[arg(long, overrides_with = "follow_symlinks")]
    pub no_follow_symlinks: bool,

    /// Skip hidden files and directories (starting with .)
    #[arg(long, overrides_with = "no_skip_hidden")]
    pub skip_hidden: bool,

    /// Include hidden files and directories, even if configured to skip them
    #[arg(long, overrides_with = "skip_hidden")]
    pub no_skip_hidden: bool,

    /// Compare file names case-insensitively (default)
    #[arg(long, overrides_with = "no_fold_case")]
    pub fold_case: bool,

    /// Compare file names case-sensitively
    #[arg(long, overrides_with = "fold_case")]
    pub no_fold_case: bool,

    /// Extra extension to index even if it is on the deny-list (repeatable)
    #[arg(long = "allow-ext", value_name = "EXT")]
    pub allow_extensions: Vec<String>,

    /// Extra extension never to index (repeatable)
    #[arg(long = "deny-ext", value_name = "EXT")]
    pub deny_extensions: Vec<String>,

    /// Summary format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Do not draw progress bars
    #[arg(long)]
    pub no_progress: bool,
}

/// Arguments for the update subcommand.
#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Root of the archive
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    #[command(flatten)]
    pub walk: WalkArgs,

    /// Which index layouts to write
    #[arg(long, value_enum, value_name = "MODE")]
    pub write_mode: Option<WriteMode>,

    /// Stop at the first directory that cannot be indexed
    #[arg(long, overrides_with = "no_fail_fast")]
    pub fail_fast: bool,

    /// Record failed directories and continue, even if configured to stop
    #[arg(long, overrides_with = "fail_fast")]
    pub no_fail_fast: bool,

    /// Re-read every file even if its size and modification time are unchanged
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the verify subcommand.
#[derive(Debug, Args)]
pub struct VerifyArgs {
    /// Root of the archive
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    #[command(flatten)]
    pub walk: WalkArgs,
}

/// Output format for the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary line
    Text,
    /// JSON summary for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Value of a `--flag` / `--no-flag` pair, `None` when neither was given.
#[must_use]
pub fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
