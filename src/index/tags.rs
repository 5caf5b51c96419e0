//! The fixed set of DICOM identification tags kept for every instance.
//!
//! Only these twelve attributes are cached; they are enough to place an
//! instance in the patient / study / series / stack hierarchy and to tell
//! instances apart. Each tag has a numeric (group, element) id and a
//! human-readable label. The label table is a read-only constant, and the
//! labels (not the numeric ids) are what appear in persisted index files.

use std::collections::BTreeMap;
use std::fmt;

/// One of the twelve cached identification tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DicomTag {
    /// (0010,0020)
    PatientId,
    /// (0020,000D)
    StudyInstanceUid,
    /// (0020,0010)
    StudyId,
    /// (0008,0050)
    AccessionNumber,
    /// (0020,000E)
    SeriesInstanceUid,
    /// (0020,0011)
    SeriesNumber,
    /// (0008,0060)
    Modality,
    /// (0020,9056)
    StackId,
    /// (0020,0012)
    AcquisitionNumber,
    /// (0020,0013)
    InstanceNumber,
    /// (0008,0018)
    SopInstanceUid,
    /// (0010,0010)
    PatientName,
}

/// Number of cached tags.
pub const TAG_COUNT: usize = 12;

/// Read-only tag table: tag, (group, element), persisted label.
const TAG_TABLE: [(DicomTag, (u16, u16), &str); TAG_COUNT] = [
    (DicomTag::PatientId, (0x0010, 0x0020), "Patient ID"),
    (DicomTag::StudyInstanceUid, (0x0020, 0x000D), "Study Instance UID"),
    (DicomTag::StudyId, (0x0020, 0x0010), "Study ID"),
    (DicomTag::AccessionNumber, (0x0008, 0x0050), "Accession Number"),
    (DicomTag::SeriesInstanceUid, (0x0020, 0x000E), "Series Instance UID"),
    (DicomTag::SeriesNumber, (0x0020, 0x0011), "Series Number"),
    (DicomTag::Modality, (0x0008, 0x0060), "Modality"),
    (DicomTag::StackId, (0x0020, 0x9056), "Stack ID"),
    (DicomTag::AcquisitionNumber, (0x0020, 0x0012), "Acquisition Number"),
    (DicomTag::InstanceNumber, (0x0020, 0x0013), "Instance Number"),
    (DicomTag::SopInstanceUid, (0x0008, 0x0018), "SOP Instance UID"),
    (DicomTag::PatientName, (0x0010, 0x0010), "Patient's Name"),
];

impl DicomTag {
    /// All cached tags, in table order.
    pub const ALL: [DicomTag; TAG_COUNT] = [
        DicomTag::PatientId,
        DicomTag::StudyInstanceUid,
        DicomTag::StudyId,
        DicomTag::AccessionNumber,
        DicomTag::SeriesInstanceUid,
        DicomTag::SeriesNumber,
        DicomTag::Modality,
        DicomTag::StackId,
        DicomTag::AcquisitionNumber,
        DicomTag::InstanceNumber,
        DicomTag::SopInstanceUid,
        DicomTag::PatientName,
    ];

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }

    /// Numeric (group, element) id.
    #[must_use]
    pub const fn group_element(self) -> (u16, u16) {
        TAG_TABLE[self.index()].1
    }

    /// Human-readable label used as the JSON key.
    #[must_use]
    pub const fn name(self) -> &'static str {
        TAG_TABLE[self.index()].2
    }

    /// Look a tag up by its label.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        TAG_TABLE
            .iter()
            .find(|(_, _, label)| *label == name)
            .map(|(tag, _, _)| *tag)
    }
}

impl fmt::Display for DicomTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (group, element) = self.group_element();
        write!(f, "{} ({:04X},{:04X})", self.name(), group, element)
    }
}

/// A required tag label was absent from a persisted tag map.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagMapError {
    /// A required tag label is missing.
    #[error("missing tag \"{0}\"")]
    Missing(&'static str),
    /// A label that is not one of the cached tags.
    #[error("unknown tag \"{0}\"")]
    Unknown(String),
}

/// Values of all twelve tags for one instance.
///
/// Storage is a fixed array indexed by tag, so every tag always has a value
/// (possibly empty). A DICOM record can never be missing a key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TagValues([String; TAG_COUNT]);

impl TagValues {
    /// Value of one tag.
    #[must_use]
    pub fn get(&self, tag: DicomTag) -> &str {
        &self.0[tag.index()]
    }

    /// Set the value of one tag.
    pub fn set(&mut self, tag: DicomTag, value: impl Into<String>) {
        self.0[tag.index()] = value.into();
    }

    /// Builder-style [`TagValues::set`].
    #[must_use]
    pub fn with(mut self, tag: DicomTag, value: impl Into<String>) -> Self {
        self.set(tag, value);
        self
    }

    /// Iterate over (tag, value) pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (DicomTag, &str)> {
        DicomTag::ALL.iter().map(move |t| (*t, self.get(*t)))
    }

    /// Convert to a label → value map for persistence.
    #[must_use]
    pub fn to_name_map(&self) -> BTreeMap<String, String> {
        self.iter()
            .map(|(tag, value)| (tag.name().to_string(), value.to_string()))
            .collect()
    }

    /// Rebuild from a label → value map.
    ///
    /// # Errors
    ///
    /// Every one of the twelve labels must be present and no other label may
    /// appear; anything else means the index file is corrupt.
    pub fn from_name_map(map: &BTreeMap<String, String>) -> Result<Self, TagMapError> {
        if let Some(unknown) = map.keys().find(|k| DicomTag::from_name(k).is_none()) {
            return Err(TagMapError::Unknown(unknown.clone()));
        }
        let mut values = Self::default();
        for tag in DicomTag::ALL {
            let value = map.get(tag.name()).ok_or(TagMapError::Missing(tag.name()))?;
            values.set(tag, value.as_str());
        }
        Ok(values)
    }
}
