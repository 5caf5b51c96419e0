//! Serde model of the persisted JSON documents and conversion to and from
//! [`DirectoryIndex`].
//!
//! One in-memory model, two layouts. Decoding validates everything the
//! types cannot: the identifying header, the timestamp format, the full tag
//! set of every DICOM entry, and the consistency of hierarchy keys with the
//! tags of the entries below them.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::index::{Classification, DicomState, DicomTag, DirectoryIndex, FileRecord, TagValues};
use crate::scanner::is_valid_mtime;

use super::Layout;

/// Value of the `id` field of every index document.
pub const CATALOG_ID: &str = "XRAD DICOM catalog";

/// Acquisition number → entries.
type AcquisitionMap = BTreeMap<String, Vec<FileEntry>>;
/// Patient → study → series → stack → acquisition → entries.
type DicomList =
    BTreeMap<String, BTreeMap<String, BTreeMap<String, BTreeMap<String, AcquisitionMap>>>>;

/// Hierarchy levels, outermost first.
const LEVELS: [DicomTag; 5] = [
    DicomTag::PatientId,
    DicomTag::StudyInstanceUid,
    DicomTag::SeriesInstanceUid,
    DicomTag::StackId,
    DicomTag::AcquisitionNumber,
];

/// One file in either layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Base name
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    /// Modification time, `YYYY-MM-DDTHH:MM:SSZ`
    pub time_write: String,
    /// Tag label → value, DICOM entries only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    /// Names of set classification flags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_type: Vec<String>,
}

/// A whole index document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Always [`CATALOG_ID`]
    pub id: String,
    /// Layout name
    #[serde(rename = "type")]
    pub kind: String,
    /// DICOM entries, hierarchical layout only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dicom_list: Option<DicomList>,
    /// Non-DICOM entries (hierarchical) or every entry (plain)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_list: Option<Vec<FileEntry>>,
}

/// Reason a document cannot be produced or accepted.
pub type Invalid = String;

fn entry_of(record: &FileRecord) -> Result<FileEntry, Invalid> {
    let tags = match record.dicom_state() {
        DicomState::Dicom => record.tags().map(TagValues::to_name_map),
        DicomState::NotDicom => None,
        DicomState::Unknown => {
            return Err(format!(
                "{} has never been checked and cannot be persisted",
                record.file_name()
            ))
        }
    };
    Ok(FileEntry {
        filename: record.file_name().to_string(),
        size: record.file_size(),
        time_write: record.modified().to_string(),
        tags,
        image_type: record.classification().names(),
    })
}

fn record_of(entry: FileEntry) -> Result<FileRecord, Invalid> {
    if entry.filename.is_empty() {
        return Err("entry with an empty filename".to_string());
    }
    if !is_valid_mtime(&entry.time_write) {
        return Err(format!(
            "{}: malformed time_write \"{}\"",
            entry.filename, entry.time_write
        ));
    }
    let record = match entry.tags {
        Some(map) => {
            let tags =
                TagValues::from_name_map(&map).map_err(|e| format!("{}: {}", entry.filename, e))?;
            let classification = Classification::from_names(&entry.image_type)
                .map_err(|e| format!("{}: {}", entry.filename, e))?;
            FileRecord::dicom(entry.filename, entry.size, entry.time_write, tags, classification)
        }
        None if entry.image_type.is_empty() => {
            FileRecord::not_dicom(entry.filename, entry.size, entry.time_write)
        }
        None => {
            return Err(format!(
                "{}: image_type on an entry without tags",
                entry.filename
            ))
        }
    };
    Ok(record.into_cached())
}

/// Build the document for `index` in `layout`.
///
/// # Errors
///
/// A record whose DICOM state was never checked cannot be represented.
pub fn encode(index: &DirectoryIndex, layout: Layout) -> Result<Document, Invalid> {
    let mut dicom_list = DicomList::new();
    let mut file_list = Vec::new();

    for record in index.records() {
        let entry = entry_of(record)?;
        match (layout, record.tags()) {
            (Layout::Hierarchical, Some(tags)) => {
                let [patient, study, series, stack, acquisition] =
                    LEVELS.map(|tag| tags.get(tag).to_string());
                dicom_list
                    .entry(patient)
                    .or_default()
                    .entry(study)
                    .or_default()
                    .entry(series)
                    .or_default()
                    .entry(stack)
                    .or_default()
                    .entry(acquisition)
                    .or_default()
                    .push(entry);
            }
            _ => file_list.push(entry),
        }
    }

    let (dicom_list, file_list) = match layout {
        Layout::Hierarchical => (
            (!dicom_list.is_empty()).then_some(dicom_list),
            (!file_list.is_empty()).then_some(file_list),
        ),
        Layout::Plain => (None, Some(file_list)),
    };

    Ok(Document {
        id: CATALOG_ID.to_string(),
        kind: layout.name().to_string(),
        dicom_list,
        file_list,
    })
}

/// Validate `document` and rebuild the index of `dir`.
///
/// # Errors
///
/// Describes the first inconsistency found.
pub fn decode(document: Document, dir: &Path, layout: Layout) -> Result<DirectoryIndex, Invalid> {
    if document.id != CATALOG_ID {
        return Err(format!("unexpected id \"{}\"", document.id));
    }
    if document.kind != layout.name() {
        return Err(format!(
            "expected type \"{}\", found \"{}\"",
            layout.name(),
            document.kind
        ));
    }

    let mut records = Vec::new();
    match layout {
        Layout::Hierarchical => {
            for entry in document.file_list.unwrap_or_default() {
                if entry.tags.is_some() {
                    return Err(format!("{}: DICOM entry in file_list", entry.filename));
                }
                records.push(record_of(entry)?);
            }
            for (patient, studies) in document.dicom_list.unwrap_or_default() {
                for (study, series_map) in studies {
                    for (series, stacks) in series_map {
                        for (stack, acquisitions) in stacks {
                            for (acquisition, entries) in acquisitions {
                                let keys = [&patient, &study, &series, &stack, &acquisition];
                                for entry in entries {
                                    if entry.tags.is_none() {
                                        return Err(format!(
                                            "{}: entry without tags in dicom_list",
                                            entry.filename
                                        ));
                                    }
                                    let record = record_of(entry)?;
                                    check_hierarchy(&record, keys)?;
                                    records.push(record);
                                }
                            }
                        }
                    }
                }
            }
        }
        Layout::Plain => {
            if document.dicom_list.is_some() {
                return Err("dicom_list in a plain document".to_string());
            }
            for entry in document.file_list.unwrap_or_default() {
                records.push(record_of(entry)?);
            }
        }
    }

    let mut seen = HashSet::with_capacity(records.len());
    if let Some(dup) = records.iter().find(|r| !seen.insert(r.file_name())) {
        return Err(format!("duplicate entry {}", dup.file_name()));
    }

    Ok(DirectoryIndex::from_records(dir, records))
}

fn check_hierarchy(record: &FileRecord, keys: [&String; 5]) -> Result<(), Invalid> {
    let Some(tags) = record.tags() else {
        return Ok(());
    };
    for (tag, key) in LEVELS.iter().zip(keys) {
        if tags.get(*tag) != key.as_str() {
            return Err(format!(
                "{}: filed under {} \"{}\" but tagged \"{}\"",
                record.file_name(),
                tag.name(),
                key,
                tags.get(*tag)
            ));
        }
    }
    Ok(())
}
