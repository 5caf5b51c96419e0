//! JSON run summary for scripting and automation.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "command": "update",
//!   "root": "/archive",
//!   "summary": {
//!     "directories_visited": 12,
//!     "directories_indexed": 11,
//!     "failed_directories": 1,
//!     "index_files_created": 2,
//!     "index_files_modified": 4,
//!     "index_files_deleted": 0,
//!     "write_failures": 0,
//!     "files_verified": 0,
//!     "added_dicom": 40,
//!     "added_non_dicom": 2,
//!     "modified_dicom": 1,
//!     "modified_non_dicom": 0,
//!     "deleted_dicom": 3,
//!     "deleted_non_dicom": 0,
//!     "duration_ms": 1234,
//!     "interrupted": false,
//!     "exit_code": 3,
//!     "exit_code_name": "DC003"
//!   },
//!   "failures": [
//!     { "path": "/archive/p7", "message": "..." }
//!   ]
//! }
//! ```
//!
//! # Example
//!
//! ```no_run
//! use dicomcat::catalog::{CatalogConfig, Indexer};
//! use dicomcat::error::ExitCode;
//! use dicomcat::output::json::JsonOutput;
//! use std::path::Path;
//!
//! let root = Path::new("/archive");
//! let catalog = Indexer::with_defaults(CatalogConfig::default()).update(root).unwrap();
//! let output = JsonOutput::new("update", root, &catalog.stats, ExitCode::Success);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::catalog::{CatalogStats, DirectoryFailure};
use crate::error::ExitCode;

/// Run counters in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary {
    /// Directories processed
    pub directories_visited: usize,
    /// Directories with a non-empty index
    pub directories_indexed: usize,
    /// Directories that failed
    pub failed_directories: usize,
    /// Index files written where none existed
    pub index_files_created: usize,
    /// Index files rewritten
    pub index_files_modified: usize,
    /// Index files removed
    pub index_files_deleted: usize,
    /// Index files that could not be written or removed
    pub write_failures: usize,
    /// Files checked by verify
    pub files_verified: usize,
    /// DICOM files added
    pub added_dicom: usize,
    /// Non-DICOM files added
    pub added_non_dicom: usize,
    /// DICOM files re-read
    pub modified_dicom: usize,
    /// Non-DICOM files re-read
    pub modified_non_dicom: usize,
    /// DICOM files gone from disk
    pub deleted_dicom: usize,
    /// Non-DICOM files gone from disk
    pub deleted_non_dicom: usize,
    /// Duration of the run in milliseconds
    pub duration_ms: u64,
    /// Whether the run was interrupted
    pub interrupted: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DC000")
    pub exit_code_name: String,
}

impl JsonSummary {
    /// Create a JSON summary from run statistics and an exit code.
    #[must_use]
    pub fn from_stats(stats: &CatalogStats, exit_code: ExitCode) -> Self {
        let r = &stats.records;
        Self {
            directories_visited: stats.directories_visited,
            directories_indexed: stats.directories_indexed,
            failed_directories: stats.failed_directories,
            index_files_created: stats.index_files_created,
            index_files_modified: stats.index_files_modified,
            index_files_deleted: stats.index_files_deleted,
            write_failures: stats.write_failures,
            files_verified: stats.files_verified,
            added_dicom: r.added_dicom,
            added_non_dicom: r.added_non_dicom,
            modified_dicom: r.modified_dicom,
            modified_non_dicom: r.modified_non_dicom,
            deleted_dicom: r.deleted_dicom,
            deleted_non_dicom: r.deleted_non_dicom,
            duration_ms: u64::try_from(stats.duration.as_millis()).unwrap_or(u64::MAX),
            interrupted: stats.interrupted,
            exit_code: exit_code.as_i32(),
            exit_code_name: exit_code.code_prefix().to_string(),
        }
    }
}

/// A failed directory in JSON format.
#[derive(Debug, Clone, Serialize)]
pub struct JsonFailure {
    /// Directory path
    pub path: String,
    /// Error message
    pub message: String,
}

impl From<&DirectoryFailure> for JsonFailure {
    fn from(failure: &DirectoryFailure) -> Self {
        Self {
            path: failure.path.to_string_lossy().into_owned(),
            message: failure.message.clone(),
        }
    }
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    /// Subcommand that ran (`update` or `verify`)
    pub command: String,
    /// Archive root
    pub root: String,
    /// Run counters
    pub summary: JsonSummary,
    /// Failed directories in directory order
    pub failures: Vec<JsonFailure>,
}

impl JsonOutput {
    /// Create the output of one run.
    ///
    /// # Example
    ///
    /// ```
    /// use dicomcat::catalog::CatalogStats;
    /// use dicomcat::error::ExitCode;
    /// use dicomcat::output::json::JsonOutput;
    /// use std::path::Path;
    ///
    /// let output = JsonOutput::new("verify", Path::new("/a"), &CatalogStats::default(), ExitCode::Success);
    /// assert_eq!(output.summary.exit_code, 0);
    /// assert!(output.failures.is_empty());
    /// ```
    #[must_use]
    pub fn new(command: &str, root: &Path, stats: &CatalogStats, exit_code: ExitCode) -> Self {
        Self {
            command: command.to_string(),
            root: root.to_string_lossy().into_owned(),
            summary: JsonSummary::from_stats(stats, exit_code),
            failures: stats.failures.iter().map(JsonFailure::from).collect(),
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}
