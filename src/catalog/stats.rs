//! Run-wide statistics.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::index::IndexStats;

/// A directory whose processing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryFailure {
    /// Directory path
    pub path: PathBuf,
    /// Error message
    pub message: String,
}

/// Counters accumulated over one indexing run.
///
/// Observability only: nothing depends on these values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogStats {
    /// Directories processed (successfully or not)
    pub directories_visited: usize,
    /// Directories with a non-empty index after the run
    pub directories_indexed: usize,
    /// Index files written where none existed
    pub index_files_created: usize,
    /// Existing index files rewritten
    pub index_files_modified: usize,
    /// Index files removed (empty directory or layout no longer written)
    pub index_files_deleted: usize,
    /// Index files that could not be written or removed
    pub write_failures: usize,
    /// Directories whose processing failed
    pub failed_directories: usize,
    /// Live files checked in verify mode
    pub files_verified: usize,
    /// Per-record changes
    pub records: IndexStats,
    /// Whether a shutdown request stopped the run early
    pub interrupted: bool,
    /// Wall-clock duration of the run
    pub duration: Duration,
    /// One entry per failed directory, in directory order
    pub failures: Vec<DirectoryFailure>,
}

impl CatalogStats {
    /// Add the counters of one directory.
    pub fn merge(&mut self, other: &CatalogStats) {
        self.directories_visited += other.directories_visited;
        self.directories_indexed += other.directories_indexed;
        self.index_files_created += other.index_files_created;
        self.index_files_modified += other.index_files_modified;
        self.index_files_deleted += other.index_files_deleted;
        self.write_failures += other.write_failures;
        self.failed_directories += other.failed_directories;
        self.files_verified += other.files_verified;
        self.records.merge(&other.records);
        self.interrupted |= other.interrupted;
        self.failures.extend(other.failures.iter().cloned());
    }

    /// Whether any directory failed or any index file could not be written.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed_directories > 0 || self.write_failures > 0
    }
}

impl fmt::Display for CatalogStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.records;
        write!(
            f,
            "{} directories ({} indexed, {} failed) in {:.2?}; index files: {} created, {} modified, \
             {} deleted; DICOM +{} ~{} -{}; other +{} ~{} -{}",
            self.directories_visited,
            self.directories_indexed,
            self.failed_directories,
            self.duration,
            self.index_files_created,
            self.index_files_modified,
            self.index_files_deleted,
            r.added_dicom,
            r.modified_dicom,
            r.deleted_dicom,
            r.added_non_dicom,
            r.modified_non_dicom,
            r.deleted_non_dicom,
        )?;
        if self.interrupted {
            f.write_str(" (interrupted)")?;
        }
        Ok(())
    }
}
