//! The per-directory cache.
//!
//! A [`DirectoryIndex`] holds one [`FileRecord`] per file of a directory:
//! name, size, modification time, and either "not DICOM" or the twelve
//! identification tags plus a [`Classification`]. Records are trusted as
//! long as size and modification time match the file on disk exactly; any
//! difference makes them stale and forces a fresh extraction.
//!
//! # Architecture
//!
//! - [`tags`]: the fixed tag table and [`TagValues`]
//! - [`classification`]: [`ImageKind`] hierarchy and [`Classification`] flags
//! - [`record`]: [`FileRecord`] and its extraction from disk
//! - [`directory`]: [`DirectoryIndex`] with `update` and `check_up_to_date`
//! - [`stats`]: [`IndexStats`] change counters

pub mod classification;
pub mod directory;
pub mod record;
pub mod stats;
pub mod tags;

pub use classification::{Classification, ImageKind, UnknownImageKind};
pub use directory::{rename_score, DirectoryIndex, IndexError, VerifyError, MAX_SCORE};
pub use record::{DicomState, ExtractPolicy, FileRecord, Provenance, RecordError};
pub use stats::IndexStats;
pub use tags::{DicomTag, TagMapError, TagValues, TAG_COUNT};
