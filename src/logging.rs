//! Logging setup for dicomcat.
//!
//! Library code logs through the `log` facade; the binary installs an
//! `env_logger` backend here. The level comes from, in priority order:
//!
//! 1. the `RUST_LOG` environment variable, when set
//! 2. `--quiet` (errors only) or `--verbose` (`-v` debug, `-vv` trace)
//! 3. info
//!
//! What each level shows during a run:
//!
//! - `info`: phase starts and the run summary
//! - `debug`: per-directory load, change count and index file removal
//! - `trace`: per-file decisions (keep, rename, refresh, add, delete)
//! - `warn`: unreadable index files and failed writes
//! - `error`: directories that could not be processed
//!
//! # Example
//!
//! ```rust,no_run
//! use dicomcat::logging::init_logging;
//!
//! init_logging(1, false, false);
//! log::debug!("visible");
//! ```

use env_logger::{Builder, WriteStyle};
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Install the logger for the given CLI verbosity.
///
/// Installing twice is harmless: the second call keeps the first logger,
/// which lets tests drive `run_app` repeatedly in one process.
pub fn init_logging(verbose: u8, quiet: bool, no_color: bool) {
    let mut builder = Builder::new();
    if no_color {
        builder.write_style(WriteStyle::Never);
    }
    let from_env = env::var("RUST_LOG").is_ok();
    if from_env {
        builder.parse_default_env();
    } else {
        builder.filter_level(level_for(verbose, quiet));
    }

    let with_module = verbose >= 1 || from_env;
    builder.format(move |buf, record| {
        let level = record.level();
        let style = buf.default_level_style(level);
        if with_module {
            writeln!(
                buf,
                "{} {style}{:<5}{style:#} [{}] {}",
                buf.timestamp_seconds(),
                level,
                record.module_path().unwrap_or("?"),
                record.args()
            )
        } else {
            writeln!(buf, "{style}{:<5}{style:#} {}", level, record.args())
        }
    });

    if builder.try_init().is_ok() {
        log::debug!("Logging initialized at {}", current_level_name());
    }
}

/// Level selected by the CLI flags alone.
fn level_for(verbose: u8, quiet: bool) -> LevelFilter {
    match (quiet, verbose) {
        (true, _) => LevelFilter::Error,
        (false, 0) => LevelFilter::Info,
        (false, 1) => LevelFilter::Debug,
        (false, _) => LevelFilter::Trace,
    }
}

/// Name of the active maximum level.
#[must_use]
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
