//! Cached identity and metadata of a single file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::extract::{ExtractError, MetadataExtractor};
use crate::scanner::format_mtime;

use super::{Classification, TagValues};

/// Whether a file is known to be DICOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DicomState {
    /// Never checked
    Unknown,
    /// Checked, not a DICOM file
    NotDicom,
    /// Checked, a DICOM file
    Dicom,
}

/// Where a record's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Read back from a persisted index file
    Cached,
    /// Produced by the metadata extractor during this run
    Extracted,
}

/// How to treat an extractor failure that is not an I/O error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractPolicy {
    /// Any extractor failure is an error.
    Strict,
    /// A corrupt file is recorded as non-DICOM; I/O errors still fail.
    Lenient,
}

/// Failure to build a record from the file on disk.
#[derive(thiserror::Error, Debug)]
pub enum RecordError {
    /// The file could not be stat'ed.
    #[error("cannot stat {path}: {source}")]
    Stat {
        /// File path
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The extractor failed on the file.
    #[error("cannot extract metadata from {path}: {source}")]
    Extract {
        /// File path
        path: PathBuf,
        /// The extractor's error
        #[source]
        source: ExtractError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Content {
    Unknown,
    NotDicom,
    Dicom {
        tags: TagValues,
        classification: Classification,
    },
}

/// Identity and cached metadata of one file in a directory.
///
/// Equality compares name, size, modification time and content. Provenance
/// and the transient re-indexing flag are ignored, so a record read back
/// from disk equals the record that was written.
#[derive(Debug, Clone)]
pub struct FileRecord {
    file_name: String,
    file_size: u64,
    modified: String,
    content: Content,
    provenance: Provenance,
    pub(crate) needs_reindexing: bool,
}

impl FileRecord {
    fn with_content(
        file_name: impl Into<String>,
        file_size: u64,
        modified: impl Into<String>,
        content: Content,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            file_size,
            modified: modified.into(),
            content,
            provenance: Provenance::Extracted,
            needs_reindexing: false,
        }
    }

    /// A record whose content has never been checked.
    #[must_use]
    pub fn unknown(file_name: impl Into<String>, file_size: u64, modified: impl Into<String>) -> Self {
        Self::with_content(file_name, file_size, modified, Content::Unknown)
    }

    /// A record for a file confirmed not to be DICOM.
    #[must_use]
    pub fn not_dicom(
        file_name: impl Into<String>,
        file_size: u64,
        modified: impl Into<String>,
    ) -> Self {
        Self::with_content(file_name, file_size, modified, Content::NotDicom)
    }

    /// A record for a DICOM file.
    #[must_use]
    pub fn dicom(
        file_name: impl Into<String>,
        file_size: u64,
        modified: impl Into<String>,
        tags: TagValues,
        classification: Classification,
    ) -> Self {
        Self::with_content(
            file_name,
            file_size,
            modified,
            Content::Dicom {
                tags,
                classification,
            },
        )
    }

    /// Build a record from the file `name` inside `dir`.
    ///
    /// The file is stat'ed first; a stat failure is always an error so that
    /// files that vanished are never indexed. [`ExtractError::NotDicom`]
    /// yields a non-DICOM record. A corrupt file yields a non-DICOM record
    /// under [`ExtractPolicy::Lenient`] and an error under
    /// [`ExtractPolicy::Strict`]. I/O errors from the extractor always fail.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] as described above.
    pub fn extract(
        dir: &Path,
        name: &str,
        extractor: &dyn MetadataExtractor,
        policy: ExtractPolicy,
    ) -> Result<Self, RecordError> {
        let path = dir.join(name);
        let stat_err = |source| RecordError::Stat {
            path: path.clone(),
            source,
        };
        let metadata = fs::metadata(&path).map_err(stat_err)?;
        let modified = metadata.modified().map_err(stat_err)?;
        let size = metadata.len();
        let modified = format_mtime(modified);

        match extractor.extract(&path) {
            Ok(meta) => {
                log::trace!("{}: DICOM", path.display());
                Ok(Self::dicom(name, size, modified, meta.tags, meta.classification))
            }
            Err(ExtractError::NotDicom) => {
                log::trace!("{}: not DICOM", path.display());
                Ok(Self::not_dicom(name, size, modified))
            }
            Err(ExtractError::Corrupt { reason, .. }) if policy == ExtractPolicy::Lenient => {
                log::warn!(
                    "Treating {} as non-DICOM: {}",
                    path.display(),
                    reason
                );
                Ok(Self::not_dicom(name, size, modified))
            }
            Err(source) => Err(RecordError::Extract { path, source }),
        }
    }

    /// Base name within the directory.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Size in bytes at extraction time.
    #[must_use]
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Formatted modification time at extraction time.
    #[must_use]
    pub fn modified(&self) -> &str {
        &self.modified
    }

    /// DICOM state of the file.
    #[must_use]
    pub fn dicom_state(&self) -> DicomState {
        match self.content {
            Content::Unknown => DicomState::Unknown,
            Content::NotDicom => DicomState::NotDicom,
            Content::Dicom { .. } => DicomState::Dicom,
        }
    }

    /// Whether the file is confirmed DICOM.
    #[must_use]
    pub fn is_dicom(&self) -> bool {
        self.dicom_state() == DicomState::Dicom
    }

    /// Where the content came from.
    #[must_use]
    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    /// Tag values; `None` unless the file is DICOM.
    #[must_use]
    pub fn tags(&self) -> Option<&TagValues> {
        match &self.content {
            Content::Dicom { tags, .. } => Some(tags),
            _ => None,
        }
    }

    /// Classification; [`Classification::NONE`] unless the file is DICOM.
    #[must_use]
    pub fn classification(&self) -> Classification {
        match &self.content {
            Content::Dicom { classification, .. } => *classification,
            _ => Classification::NONE,
        }
    }

    /// Whether the cached data is known stale.
    #[must_use]
    pub fn needs_reindexing(&self) -> bool {
        self.needs_reindexing
    }

    /// Force a refresh from the file on the next update.
    pub fn mark_for_reindexing(&mut self) {
        self.needs_reindexing = true;
    }

    /// Mark the record as read back from a persisted index.
    #[must_use]
    pub fn into_cached(mut self) -> Self {
        self.provenance = Provenance::Cached;
        self.needs_reindexing = false;
        self
    }

    /// Exact size and modification time comparison.
    #[must_use]
    pub fn matches_filesystem(&self, size: u64, modified: &str) -> bool {
        self.file_size == size && self.modified == modified
    }

    /// Same content under the live spelling of the name.
    pub(crate) fn renamed(&self, file_name: &str) -> Self {
        let mut record = self.clone();
        record.file_name = file_name.to_string();
        record
    }
}

impl PartialEq for FileRecord {
    fn eq(&self, other: &Self) -> bool {
        self.file_name == other.file_name
            && self.file_size == other.file_size
            && self.modified == other.modified
            && self.content == other.content
    }
}

impl Eq for FileRecord {}
