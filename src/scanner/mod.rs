//! Scanner module for the single up-front directory walk.
//!
//! This module provides functionality for:
//! - Walking a directory tree once using jwalk
//! - Capturing each file's name, size and modification time
//! - Unicode/case normalization of file names
//! - Deciding which file names are plausibly indexable
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal producing a [`DirectoryTree`]
//! - [`path_utils`]: NFC normalization and case folding of names
//! - [`filter`]: Extension allow/deny lists and reserved names
//!
//! # Example
//!
//! ```no_run
//! use dicomcat::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/data/archive"), WalkerConfig::default());
//! let tree = walker.walk().expect("walk failed");
//! for listing in tree.flatten() {
//!     println!("{}: {} files", listing.path.display(), listing.files.len());
//! }
//! ```

pub mod filter;
pub mod path_utils;
pub mod walker;

use std::path::PathBuf;
use std::time::SystemTime;

use chrono::{DateTime, Utc};

pub use filter::{NameFilter, NameRules};
pub use walker::Walker;

/// Fixed layout of every persisted modification time.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Format a modification time as `YYYY-MM-DDTHH:MM:SSZ` (UTC, truncated to seconds).
///
/// # Example
///
/// ```
/// use dicomcat::scanner::format_mtime;
/// use std::time::{Duration, UNIX_EPOCH};
///
/// let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_999);
/// assert_eq!(format_mtime(t), "2023-11-14T22:13:20Z");
/// ```
#[must_use]
pub fn format_mtime(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Check that a string is a well-formed persisted timestamp.
#[must_use]
pub fn is_valid_mtime(value: &str) -> bool {
    chrono::NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT).is_ok()
}

/// A file observed on disk during the walk.
///
/// This is the live side of reconciliation: whatever the cache says,
/// these triples describe what the directory actually holds right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveFile {
    /// Base name within its directory
    pub name: String,
    /// File size in bytes
    pub size: u64,
    /// Modification time, already formatted with [`TIMESTAMP_FORMAT`]
    pub modified: String,
}

impl LiveFile {
    /// Create a new LiveFile.
    ///
    /// # Arguments
    ///
    /// * `name` - Base name of the file
    /// * `size` - File size in bytes
    /// * `modified` - Formatted modification time
    #[must_use]
    pub fn new(name: impl Into<String>, size: u64, modified: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            modified: modified.into(),
        }
    }

    /// Create a LiveFile from a raw [`SystemTime`].
    #[must_use]
    pub fn with_time(name: impl Into<String>, size: u64, modified: SystemTime) -> Self {
        Self::new(name, size, format_mtime(modified))
    }
}

/// The files of one directory, as seen by the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryListing {
    /// Absolute directory path
    pub path: PathBuf,
    /// Files directly inside the directory, sorted by name
    pub files: Vec<LiveFile>,
}

impl DirectoryListing {
    /// Check whether a file with exactly this name was listed.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.files.iter().any(|f| f.name == name)
    }
}

/// Result of the recursive walk: one node per directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTree {
    /// Absolute directory path
    pub path: PathBuf,
    /// Files directly inside the directory, sorted by name
    pub files: Vec<LiveFile>,
    /// Child directories, sorted by path
    pub subdirectories: Vec<DirectoryTree>,
}

impl DirectoryTree {
    /// Total number of directories in the tree, including this one.
    #[must_use]
    pub fn directory_count(&self) -> usize {
        1 + self
            .subdirectories
            .iter()
            .map(DirectoryTree::directory_count)
            .sum::<usize>()
    }

    /// Total number of files in the tree.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
            + self
                .subdirectories
                .iter()
                .map(DirectoryTree::file_count)
                .sum::<usize>()
    }

    /// Flatten into per-directory listings in pre-order.
    ///
    /// A parent is always visited before its children and siblings keep
    /// their sorted order, so the sequence is stable across runs.
    #[must_use]
    pub fn flatten(self) -> Vec<DirectoryListing> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            let DirectoryTree {
                path,
                files,
                subdirectories,
            } = node;
            out.push(DirectoryListing { path, files });
            stack.extend(subdirectories.into_iter().rev());
        }
        out
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Warning: May cause infinite loops with symlink cycles.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,
}

impl WalkerConfig {
    /// Create a new walker configuration.
    #[must_use]
    pub fn new(follow_symlinks: bool, skip_hidden: bool) -> Self {
        Self {
            follow_symlinks,
            skip_hidden,
        }
    }
}

/// Errors that can occur during directory scanning.
///
/// Every variant is fatal to the run: reconciliation needs a complete
/// listing of each directory, so a partial walk is never used.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The walk was stopped by a shutdown request.
    #[error("Walk interrupted")]
    Interrupted,

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
