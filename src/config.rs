//! Layered application configuration.
//!
//! Values are merged from, lowest priority first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config PATH`, or `config.toml` in the platform config
//!    directory when present)
//! 3. `DICOMCAT_*` environment variables, e.g. `DICOMCAT_IO_THREADS=8`
//! 4. command-line flags
//!
//! ```toml
//! write_mode = "plain"
//! io_threads = 8
//! fold_case = true
//! extra_denied_extensions = ["raw", "bak"]
//! ```

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::CatalogConfig;
use crate::cli::{flag_pair, UpdateArgs, WalkArgs};
use crate::codec::WriteMode;
use crate::scanner::{NameFilter, WalkerConfig};

/// Prefix of the environment variables read by [`Config::load`].
pub const ENV_PREFIX: &str = "DICOMCAT_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Index layouts written by `update`.
    pub write_mode: WriteMode,
    /// Worker threads for per-directory processing.
    pub io_threads: usize,
    /// Follow symbolic links during the walk.
    pub follow_symlinks: bool,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Compare file names case-insensitively.
    pub fold_case: bool,
    /// Stop at the first failed directory.
    pub fail_fast: bool,
    /// Extensions indexed even when on the built-in deny-list.
    pub extra_allowed_extensions: Vec<String>,
    /// Extensions never indexed.
    pub extra_denied_extensions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_mode: WriteMode::Both,
            io_threads: 4,
            follow_symlinks: false,
            skip_hidden: false,
            fold_case: true,
            fail_fast: false,
            extra_allowed_extensions: Vec::new(),
            extra_denied_extensions: Vec::new(),
        }
    }
}

impl Config {
    /// Load defaults, then the config file, then the environment.
    ///
    /// An explicit `path` must exist; the default file is optional.
    ///
    /// # Errors
    ///
    /// Returns an error if the explicit file is missing or if any source
    /// holds a value of the wrong type.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => {
                if !p.is_file() {
                    anyhow::bail!("Configuration file not found: {}", p.display());
                }
                Some(p.to_path_buf())
            }
            None => Self::default_path(),
        };
        Self::figment(file.as_deref())
            .extract()
            .context("Invalid configuration")
    }

    /// The provider chain without command-line overrides.
    #[must_use]
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            log::debug!("Reading configuration from {}", file.display());
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// `config.toml` in the platform-specific configuration directory.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "dicomcat", "dicomcat")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Apply the walk options given on the command line.
    #[must_use]
    pub fn with_walk_args(mut self, args: &WalkArgs) -> Self {
        if let Some(threads) = args.io_threads {
            self.io_threads = threads;
        }
        if let Some(follow) = flag_pair(args.follow_symlinks, args.no_follow_symlinks) {
            self.follow_symlinks = follow;
        }
        if let Some(skip) = flag_pair(args.skip_hidden, args.no_skip_hidden) {
            self.skip_hidden = skip;
        }
        if let Some(fold) = flag_pair(args.fold_case, args.no_fold_case) {
            self.fold_case = fold;
        }
        self.extra_allowed_extensions
            .extend(args.allow_extensions.iter().cloned());
        self.extra_denied_extensions
            .extend(args.deny_extensions.iter().cloned());
        self
    }

    /// Apply every option of the update subcommand.
    #[must_use]
    pub fn with_update_args(self, args: &UpdateArgs) -> Self {
        let mut config = self.with_walk_args(&args.walk);
        if let Some(mode) = args.write_mode {
            config.write_mode = mode;
        }
        if let Some(fail_fast) = flag_pair(args.fail_fast, args.no_fail_fast) {
            config.fail_fast = fail_fast;
        }
        config
    }

    /// Catalog settings for this configuration.
    #[must_use]
    pub fn to_catalog_config(&self) -> CatalogConfig {
        CatalogConfig::default()
            .with_io_threads(self.io_threads)
            .with_write_mode(self.write_mode)
            .with_walker_config(WalkerConfig::new(self.follow_symlinks, self.skip_hidden))
            .with_fold_case(self.fold_case)
            .with_fail_fast(self.fail_fast)
            .with_filter(NameFilter::default().with_extra(
                &self.extra_allowed_extensions,
                &self.extra_denied_extensions,
            ))
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}
