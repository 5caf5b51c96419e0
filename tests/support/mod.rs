//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dicomcat::catalog::{CatalogConfig, Indexer};
use dicomcat::extract::{ExtractError, ExtractedMetadata, MetadataExtractor};
use dicomcat::index::{Classification, DicomTag, ImageKind, TagValues};
use filetime::FileTime;

/// Fixed modification time used by [`write_file`] (2024-01-02T03:04:05Z).
pub const MTIME: i64 = 1_704_164_645;

/// Extractor driven by file content, counting every call.
///
/// - content starting with `DICM` is a CT slice whose patient ID is the
///   rest of the content
/// - content `CORRUPT` is a corrupt DICOM file
/// - anything else is not DICOM
#[derive(Default)]
pub struct CountingExtractor {
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl CountingExtractor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// File names passed to the extractor, sorted.
    pub fn seen(&self) -> Vec<String> {
        let mut seen = self.seen.lock().unwrap().clone();
        seen.sort();
        seen
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.seen.lock().unwrap().clear();
    }
}

impl MetadataExtractor for CountingExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedMetadata, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(name) = path.file_name() {
            self.seen
                .lock()
                .unwrap()
                .push(name.to_string_lossy().into_owned());
        }
        let content = fs::read_to_string(path).unwrap_or_default();
        if content == "CORRUPT" {
            return Err(ExtractError::Corrupt {
                path: path.to_path_buf(),
                reason: "truncated dataset".to_string(),
            });
        }
        match content.strip_prefix("DICM") {
            Some(patient) => Ok(ExtractedMetadata::new(
                TagValues::default()
                    .with(DicomTag::PatientId, patient.trim())
                    .with(DicomTag::Modality, "CT")
                    .with(DicomTag::StudyInstanceUid, "1.2.3")
                    .with(DicomTag::SeriesInstanceUid, "1.2.3.4"),
                Classification::of(ImageKind::CtSlice),
            )),
            None => Err(ExtractError::NotDicom),
        }
    }
}

/// Write `content` to `dir/name` with the fixed [`MTIME`].
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    write_file_at(dir, name, content, MTIME)
}

/// Write `content` to `dir/name` with modification time `mtime` (Unix seconds).
pub fn write_file_at(dir: &Path, name: &str, content: &str, mtime: i64) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    filetime::set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    path
}

/// An indexer using `extractor`.
pub fn indexer(config: CatalogConfig, extractor: &Arc<CountingExtractor>) -> Indexer {
    Indexer::new(config, Arc::clone(extractor) as Arc<dyn MetadataExtractor>)
}

/// A small archive: two series of one patient and a loose report.
///
/// ```text
/// root/
///   P1/
///     README            (not DICOM)
///     S1/IM0001 IM0002  (DICOM)
///     S2/IM0001         (DICOM)
///   notes.txt           (denied extension)
/// ```
pub fn archive(root: &Path) {
    write_file(root, "P1/README", "patient folder");
    write_file(root, "P1/S1/IM0001", "DICM P1");
    write_file(root, "P1/S1/IM0002", "DICM P1");
    write_file(root, "P1/S2/IM0001", "DICM P1");
    write_file(root, "notes.txt", "not indexed");
}
