//! Catalog orchestration over a whole directory tree.
//!
//! An indexing run:
//!
//! 1. **Walk** - one recursive walk of the root collects every directory
//!    with the name, size and modification time of its files
//! 2. **Process** - every directory is handled independently on a rayon pool:
//!    - *update mode*: load the index file (if any), reconcile it with the
//!      listing, rewrite or delete the index files
//!    - *verify mode*: load every index file and require an exact match,
//!      no writes and no extraction
//! 3. **Aggregate** - results are merged in directory order, so statistics
//!    and failure lists are reproducible
//!
//! A walk failure aborts the run before any directory is touched. In update
//! mode a failing directory is recorded and the run continues, unless
//! `fail_fast` is set. In verify mode the first mismatch fails the run.
//! Directories after a failure are skipped; earlier ones still run, so the
//! error returned is the first in directory order.
//!
//! # Example
//!
//! ```no_run
//! use dicomcat::catalog::{CatalogConfig, Indexer};
//! use std::path::Path;
//!
//! let indexer = Indexer::with_defaults(CatalogConfig::default().with_io_threads(8));
//! let catalog = indexer.update(Path::new("/archive")).unwrap();
//! println!("{}", catalog.stats);
//! ```

mod process;
pub mod stats;

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use crate::codec::{self, CodecError, WriteMode};
use crate::extract::{DicomFileExtractor, MetadataExtractor};
use crate::index::{DirectoryIndex, IndexError, VerifyError};
use crate::progress::ProgressCallback;
use crate::scanner::{DirectoryListing, NameFilter, NameRules, ScanError, Walker, WalkerConfig};

use self::process::Context;
pub use self::stats::{CatalogStats, DirectoryFailure};

/// What a run does with each directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Reconcile and persist
    Update,
    /// Read-only exact check
    Verify,
}

impl Mode {
    fn phase(self) -> &'static str {
        match self {
            Mode::Update => "index",
            Mode::Verify => "verify",
        }
    }
}

/// Errors that end an indexing run.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The directory walk failed.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// The walk was stopped by a shutdown request.
    #[error("Indexing interrupted by user")]
    Interrupted,

    /// An index file could not be read in verify mode.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The index disagrees with the directory.
    #[error(transparent)]
    Verify(#[from] VerifyError),

    /// A directory could not be updated.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Configuration of an indexing run.
#[derive(Clone)]
pub struct CatalogConfig {
    /// Worker threads for per-directory processing and extraction.
    pub io_threads: usize,
    /// Which index layouts are written.
    pub write_mode: WriteMode,
    /// Walk options.
    pub walker_config: WalkerConfig,
    /// Compare file names case-insensitively.
    pub fold_case: bool,
    /// Stop at the first failed directory.
    pub fail_fast: bool,
    /// Re-extract every file regardless of size and modification time.
    pub force: bool,
    /// Extension filter.
    pub filter: NameFilter,
    /// Optional shutdown flag for graceful termination.
    pub shutdown_flag: Option<Arc<AtomicBool>>,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for CatalogConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogConfig")
            .field("io_threads", &self.io_threads)
            .field("write_mode", &self.write_mode)
            .field("walker_config", &self.walker_config)
            .field("fold_case", &self.fold_case)
            .field("fail_fast", &self.fail_fast)
            .field("force", &self.force)
            .field("filter", &self.filter)
            .field("shutdown_flag", &self.shutdown_flag)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            write_mode: WriteMode::default(),
            walker_config: WalkerConfig::default(),
            fold_case: true,
            fail_fast: false,
            force: false,
            filter: NameFilter::default(),
            shutdown_flag: None,
            progress_callback: None,
        }
    }
}

impl CatalogConfig {
    /// Set the worker thread count (at least 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Set which layouts are written.
    #[must_use]
    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker_config = config;
        self
    }

    /// Enable or disable case-insensitive name matching.
    #[must_use]
    pub fn with_fold_case(mut self, fold_case: bool) -> Self {
        self.fold_case = fold_case;
        self
    }

    /// Stop at the first failed directory.
    #[must_use]
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Re-extract every file.
    #[must_use]
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Set the extension filter.
    #[must_use]
    pub fn with_filter(mut self, filter: NameFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the shutdown flag for graceful termination.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Name rules for this configuration.
    #[must_use]
    pub fn name_rules(&self) -> NameRules {
        NameRules::new(self.filter.clone(), codec::reserved_names(), self.fold_case)
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }
}

/// Result of a run: every non-empty directory index plus statistics.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    /// Non-empty directory indexes, in walk order
    pub directories: Vec<DirectoryIndex>,
    /// Aggregated statistics
    pub stats: CatalogStats,
}

impl CatalogIndex {
    /// Index of one directory.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&DirectoryIndex> {
        self.directories.iter().find(|d| d.path() == path)
    }

    /// Total number of records.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.directories.iter().map(DirectoryIndex::len).sum()
    }

    /// Total number of DICOM records.
    #[must_use]
    pub fn dicom_count(&self) -> usize {
        self.directories.iter().map(DirectoryIndex::dicom_count).sum()
    }
}

enum Outcome {
    Done(Option<DirectoryIndex>, CatalogStats),
    Failed(CatalogError),
    Interrupted,
    Aborted,
}

/// Runs indexing passes over directory trees.
pub struct Indexer {
    config: CatalogConfig,
    extractor: Arc<dyn MetadataExtractor>,
}

impl Indexer {
    /// Create an indexer with a custom extractor.
    #[must_use]
    pub fn new(config: CatalogConfig, extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self { config, extractor }
    }

    /// Create an indexer reading DICOM files from disk.
    #[must_use]
    pub fn with_defaults(config: CatalogConfig) -> Self {
        Self::new(config, Arc::new(DicomFileExtractor::new()))
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Update every index under `root`.
    ///
    /// # Errors
    ///
    /// See [`Indexer::run`].
    pub fn update(&self, root: &Path) -> Result<CatalogIndex, CatalogError> {
        self.run(root, Mode::Update)
    }

    /// Check every index under `root` without writing.
    ///
    /// # Errors
    ///
    /// See [`Indexer::run`].
    pub fn verify(&self, root: &Path) -> Result<CatalogIndex, CatalogError> {
        self.run(root, Mode::Verify)
    }

    /// Walk `root` once, then process every directory in `mode`.
    ///
    /// # Errors
    ///
    /// - [`CatalogError::Scan`] if the walk fails
    /// - [`CatalogError::Interrupted`] if shutdown is requested during the walk
    /// - in verify mode, the first [`CatalogError::Verify`] or
    ///   [`CatalogError::Codec`] in directory order
    /// - in update mode with `fail_fast`, the first failed directory's error
    ///
    /// A shutdown request after the walk returns `Ok` with
    /// `stats.interrupted` set.
    pub fn run(&self, root: &Path, mode: Mode) -> Result<CatalogIndex, CatalogError> {
        let start = Instant::now();
        let root = std::path::absolute(root).map_err(|source| ScanError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let listings = self.walk(&root)?;
        log::info!(
            "{}: {} directories under {}",
            mode.phase(),
            listings.len(),
            root.display()
        );

        let rules = self.config.name_rules();
        let ctx = Context {
            rules: &rules,
            extractor: self.extractor.as_ref(),
            write_mode: self.config.write_mode,
            force: self.config.force,
        };
        let stop_on_failure = mode == Mode::Verify || self.config.fail_fast;
        let first_failed = AtomicUsize::new(usize::MAX);
        let done = AtomicUsize::new(0);

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start(mode.phase(), listings.len());
        }

        let outcomes: Vec<Outcome> = self.in_pool(|| {
            listings
                .par_iter()
                .enumerate()
                .map(|(i, listing)| {
                    if self.config.is_shutdown_requested() {
                        return Outcome::Interrupted;
                    }
                    if i > first_failed.load(Ordering::SeqCst) {
                        return Outcome::Aborted;
                    }
                    let result = match mode {
                        Mode::Update => process::update_directory(listing, &ctx),
                        Mode::Verify => process::verify_directory(listing, &rules),
                    };
                    if let Some(ref callback) = self.config.progress_callback {
                        let n = done.fetch_add(1, Ordering::SeqCst) + 1;
                        callback.on_progress(n, listing.path.to_string_lossy().as_ref());
                    }
                    match result {
                        Ok((index, stats)) => Outcome::Done(index, stats),
                        Err(e) => {
                            if stop_on_failure {
                                first_failed.fetch_min(i, Ordering::SeqCst);
                            }
                            Outcome::Failed(e)
                        }
                    }
                })
                .collect()
        });

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end(mode.phase());
        }

        let mut catalog = CatalogIndex::default();
        let mut first_error = None;
        for (listing, outcome) in listings.iter().zip(outcomes) {
            match outcome {
                Outcome::Done(index, stats) => {
                    catalog.stats.merge(&stats);
                    catalog.directories.extend(index);
                }
                Outcome::Failed(e) => {
                    log::error!("{}: {}", listing.path.display(), e);
                    record_failure(&mut catalog.stats, listing, &e);
                    if stop_on_failure && first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Outcome::Interrupted => catalog.stats.interrupted = true,
                Outcome::Aborted => {}
            }
        }
        catalog.stats.duration = start.elapsed();

        if let Some(e) = first_error {
            return Err(e);
        }
        if catalog.stats.interrupted {
            log::info!("{}: interrupted by shutdown signal", mode.phase());
        }
        log::info!("{}: {}", mode.phase(), catalog.stats);
        Ok(catalog)
    }

    fn walk(&self, root: &Path) -> Result<Vec<DirectoryListing>, CatalogError> {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("walking", 0);
        }
        let mut walker = Walker::new(root, self.config.walker_config.clone());
        if let Some(ref flag) = self.config.shutdown_flag {
            walker = walker.with_shutdown_flag(Arc::clone(flag));
        }
        let result = walker.walk();
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("walking");
        }
        match result {
            Ok(tree) => Ok(tree.flatten()),
            Err(ScanError::Interrupted) => Err(CatalogError::Interrupted),
            Err(e) => Err(e.into()),
        }
    }

    fn in_pool<T: Send>(&self, f: impl FnOnce() -> T + Send) -> T {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .build()
        {
            Ok(pool) => pool.install(f),
            Err(e) => {
                log::warn!(
                    "Failed to create custom thread pool ({}), using global pool with {} threads",
                    e,
                    rayon::current_num_threads()
                );
                f()
            }
        }
    }
}

fn record_failure(stats: &mut CatalogStats, listing: &DirectoryListing, error: &CatalogError) {
    stats.directories_visited += 1;
    stats.failed_directories += 1;
    stats.failures.push(DirectoryFailure {
        path: listing.path.clone(),
        message: error.to_string(),
    });
}
