//! Metadata extraction seam.
//!
//! The index never parses DICOM itself. It asks a [`MetadataExtractor`] for
//! the twelve identification tags and the classification of one file, and
//! distinguishes three outcomes:
//!
//! * success: the file is DICOM, here is its metadata
//! * [`ExtractError::NotDicom`]: the file was read and is not DICOM
//! * any other error: the file could not be read or could not be parsed
//!
//! Conflating "not DICOM" with "could not read" would let an unreadable
//! share silently turn every instance into a non-DICOM entry.
//!
//! [`DicomFileExtractor`] is the production implementation; tests supply
//! their own.

pub mod reader;

use std::path::{Path, PathBuf};

use crate::index::{Classification, TagValues};

pub use self::reader::DicomFileExtractor;

/// Metadata of one DICOM file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedMetadata {
    /// The twelve identification tags
    pub tags: TagValues,
    /// Classification flags, closed under the hierarchy
    pub classification: Classification,
}

impl ExtractedMetadata {
    /// Create extracted metadata.
    #[must_use]
    pub fn new(tags: TagValues, classification: Classification) -> Self {
        Self {
            tags,
            classification,
        }
    }
}

/// Errors reported by a [`MetadataExtractor`].
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    /// The file was read and is not a DICOM file.
    #[error("not a DICOM file")]
    NotDicom,

    /// The file could not be read.
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file looks like DICOM but its content could not be parsed.
    #[error("corrupt DICOM file {path}: {reason}")]
    Corrupt {
        /// File being parsed
        path: PathBuf,
        /// Parser message
        reason: String,
    },
}

/// Source of per-file DICOM metadata.
///
/// Implementations must be thread-safe: directories, and files within a
/// directory, are processed on a rayon pool.
pub trait MetadataExtractor: Send + Sync {
    /// Extract tags and classification from the file at `path`.
    ///
    /// # Errors
    ///
    /// [`ExtractError::NotDicom`] when the file is readable but not DICOM,
    /// [`ExtractError::Io`] or [`ExtractError::Corrupt`] otherwise.
    fn extract(&self, path: &Path) -> Result<ExtractedMetadata, ExtractError>;
}

impl<T: MetadataExtractor + ?Sized> MetadataExtractor for std::sync::Arc<T> {
    fn extract(&self, path: &Path) -> Result<ExtractedMetadata, ExtractError> {
        (**self).extract(path)
    }
}
