//! Persistence of [`DirectoryIndex`] as JSON files inside each directory.
//!
//! Two layouts coexist under fixed reserved names:
//!
//! - [`Layout::Hierarchical`] (`dicom_catalog.json`): DICOM entries nested
//!   patient → study → series → stack → acquisition under `dicom_list`,
//!   everything else flat under `file_list`.
//! - [`Layout::Plain`] (`dicom_catalog_plain.json`): every entry flat under
//!   `file_list`.
//!
//! [`WriteMode`] selects which of them are written. Writes are atomic: the
//! document goes to `<name>.tmp` first and is renamed over the final name,
//! so a crash never leaves a truncated index behind.

pub mod document;

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::index::DirectoryIndex;

pub use document::{Document, FileEntry, CATALOG_ID};

/// Suffix of the temporary file used for atomic writes.
pub const TEMP_SUFFIX: &str = ".tmp";

/// One of the two persisted layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Nested by patient / study / series / stack / acquisition
    Hierarchical,
    /// One flat list
    Plain,
}

impl Layout {
    /// Both layouts, in load-preference order.
    pub const ALL: [Layout; 2] = [Layout::Hierarchical, Layout::Plain];

    /// Value of the `type` field.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Layout::Hierarchical => "hierarchical",
            Layout::Plain => "plain",
        }
    }

    /// Reserved file name inside each directory.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Layout::Hierarchical => "dicom_catalog.json",
            Layout::Plain => "dicom_catalog_plain.json",
        }
    }

    /// Full path of the index file for `dir`.
    #[must_use]
    pub fn path_in(self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

/// Every reserved file name, for the name filter.
#[must_use]
pub fn reserved_names() -> Vec<&'static str> {
    Layout::ALL.iter().map(|l| l.file_name()).collect()
}

/// Which layouts an update writes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum WriteMode {
    /// Hierarchical layout only
    Hierarchical,
    /// Plain layout only
    Plain,
    /// Both layouts
    #[default]
    Both,
}

impl WriteMode {
    /// Whether `layout` is written in this mode.
    #[must_use]
    pub fn includes(self, layout: Layout) -> bool {
        matches!(
            (self, layout),
            (WriteMode::Both, _)
                | (WriteMode::Hierarchical, Layout::Hierarchical)
                | (WriteMode::Plain, Layout::Plain)
        )
    }

    /// Layouts written in this mode.
    pub fn layouts(self) -> impl Iterator<Item = Layout> {
        Layout::ALL.into_iter().filter(move |l| self.includes(*l))
    }
}

/// Errors reading or writing index files.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    /// The file could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// Index file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for the layout.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// Index file
        path: PathBuf,
        /// The JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The file parsed but its content is inconsistent.
    #[error("invalid index file {path}: {reason}")]
    Invalid {
        /// Index file
        path: PathBuf,
        /// What is wrong
        reason: String,
    },

    /// The file could not be written, renamed or removed.
    #[error("cannot write {path}: {source}")]
    Write {
        /// Index file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Load the index of `dir` from the file of `layout`.
///
/// Records come back with [`crate::index::Provenance::Cached`].
///
/// # Errors
///
/// [`CodecError::Read`], [`CodecError::Parse`] or [`CodecError::Invalid`].
pub fn load(dir: &Path, layout: Layout) -> Result<DirectoryIndex, CodecError> {
    let path = layout.path_in(dir);
    let content = fs::read(&path).map_err(|source| CodecError::Read {
        path: path.clone(),
        source,
    })?;
    let document: Document =
        serde_json::from_slice(&content).map_err(|source| CodecError::Parse {
            path: path.clone(),
            source,
        })?;
    document::decode(document, dir, layout).map_err(|reason| CodecError::Invalid { path, reason })
}

/// Atomically write `index` into its directory using `layout`.
///
/// # Errors
///
/// [`CodecError::Invalid`] if the index holds unchecked records,
/// [`CodecError::Write`] on I/O failure. No partial file is left behind.
pub fn save(index: &DirectoryIndex, layout: Layout) -> Result<PathBuf, CodecError> {
    let path = layout.path_in(index.path());
    let document = document::encode(index, layout).map_err(|reason| CodecError::Invalid {
        path: path.clone(),
        reason,
    })?;

    let mut temp = path.clone().into_os_string();
    temp.push(TEMP_SUFFIX);
    let temp = PathBuf::from(temp);

    let written = write_document(&temp, &document).and_then(|()| fs::rename(&temp, &path));
    if let Err(source) = written {
        let _ = fs::remove_file(&temp);
        return Err(CodecError::Write { path, source });
    }
    log::trace!("Wrote {}", path.display());
    Ok(path)
}

fn write_document(path: &Path, document: &Document) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, document)?;
    writer.write_all(b"\n")?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()
}

/// Remove the file of `layout` from `dir`.
///
/// Returns whether a file was removed.
///
/// # Errors
///
/// [`CodecError::Write`] for any failure other than the file being absent.
pub fn remove(dir: &Path, layout: Layout) -> Result<bool, CodecError> {
    let path = layout.path_in(dir);
    match fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(source) => Err(CodecError::Write { path, source }),
    }
}
