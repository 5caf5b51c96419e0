//! DICOM file reader built on the `dicom` crate.
//!
//! Reading stops before Pixel Data, so extraction cost does not grow with
//! image size. The 128-byte preamble and `DICM` magic are checked by hand
//! first: a file without them is reported as [`ExtractError::NotDicom`]
//! without involving the parser, and a parser failure after a valid magic
//! is reported as [`ExtractError::Corrupt`].

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;

use ::dicom::core::Tag;
use ::dicom::dictionary_std::tags;
use ::dicom::object::{DefaultDicomObject, OpenFileOptions};

use super::{ExtractError, ExtractedMetadata, MetadataExtractor};
use crate::index::{Classification, DicomTag, ImageKind, TagValues};

const PREAMBLE_LEN: usize = 128;
const MAGIC: &[u8; 4] = b"DICM";

/// SOP classes classified as CT slices.
const CT_SOP_CLASSES: &[&str] = &[
    "1.2.840.10008.5.1.4.1.1.2",   // CT Image Storage
    "1.2.840.10008.5.1.4.1.1.2.1", // Enhanced CT Image Storage
    "1.2.840.10008.5.1.4.1.1.2.2", // Legacy Converted Enhanced CT Image Storage
];

/// SOP classes classified as MR slices.
const MR_SOP_CLASSES: &[&str] = &[
    "1.2.840.10008.5.1.4.1.1.4",   // MR Image Storage
    "1.2.840.10008.5.1.4.1.1.4.1", // Enhanced MR Image Storage
    "1.2.840.10008.5.1.4.1.1.4.4", // Legacy Converted Enhanced MR Image Storage
];

/// SOP classes classified as projection radiographs.
const XRAY_SOP_CLASSES: &[&str] = &[
    "1.2.840.10008.5.1.4.1.1.1",       // Computed Radiography
    "1.2.840.10008.5.1.4.1.1.1.1",     // Digital X-Ray, For Presentation
    "1.2.840.10008.5.1.4.1.1.1.1.1",   // Digital X-Ray, For Processing
    "1.2.840.10008.5.1.4.1.1.1.2",     // Digital Mammography, For Presentation
    "1.2.840.10008.5.1.4.1.1.1.2.1",   // Digital Mammography, For Processing
    "1.2.840.10008.5.1.4.1.1.1.3",     // Digital Intra-Oral X-Ray, For Presentation
    "1.2.840.10008.5.1.4.1.1.1.3.1",   // Digital Intra-Oral X-Ray, For Processing
    "1.2.840.10008.5.1.4.1.1.12.1",    // X-Ray Angiographic
    "1.2.840.10008.5.1.4.1.1.12.1.1",  // Enhanced XA
    "1.2.840.10008.5.1.4.1.1.12.2",    // X-Ray Radiofluoroscopic
    "1.2.840.10008.5.1.4.1.1.12.2.1",  // Enhanced XRF
];

/// Classify an instance from its SOP Class UID and manufacturer.
///
/// Unknown SOP classes are still images when the dataset carries an image
/// pixel module (`has_rows`).
#[must_use]
pub fn classify(sop_class_uid: &str, manufacturer: &str, has_rows: bool) -> Classification {
    let uid = sop_class_uid.trim_end_matches(['\0', ' ']);
    if CT_SOP_CLASSES.contains(&uid) {
        Classification::of(ImageKind::CtSlice)
    } else if MR_SOP_CLASSES.contains(&uid) {
        if manufacturer.to_ascii_uppercase().contains("SIEMENS") {
            Classification::of(ImageKind::MrSliceSiemens)
        } else {
            Classification::of(ImageKind::MrSlice)
        }
    } else if XRAY_SOP_CLASSES.contains(&uid) {
        Classification::of(ImageKind::XrayImage)
    } else if has_rows {
        Classification::of(ImageKind::Image)
    } else {
        Classification::NONE
    }
}

/// Production [`MetadataExtractor`] reading Part 10 files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct DicomFileExtractor;

impl DicomFileExtractor {
    /// Create a new extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn has_magic(path: &Path) -> Result<bool, ExtractError> {
        let io_err = |source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(io_err)?;
        let mut header = [0u8; PREAMBLE_LEN + 4];
        match file.read_exact(&mut header) {
            Ok(()) => Ok(&header[PREAMBLE_LEN..] == MAGIC),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(false),
            Err(e) => Err(io_err(e)),
        }
    }

    fn text(obj: &DefaultDicomObject, tag: Tag) -> Option<String> {
        let element = obj.element(tag).ok()?;
        let value = element.to_str().ok()?;
        Some(value.trim_end_matches(['\0', ' ']).trim().to_string())
    }
}

impl MetadataExtractor for DicomFileExtractor {
    fn extract(&self, path: &Path) -> Result<ExtractedMetadata, ExtractError> {
        if !Self::has_magic(path)? {
            return Err(ExtractError::NotDicom);
        }

        let obj = OpenFileOptions::new()
            .read_until(tags::PIXEL_DATA)
            .open_file(path)
            .map_err(|e| ExtractError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut values = TagValues::default();
        for tag in DicomTag::ALL {
            let (group, element) = tag.group_element();
            if let Some(value) = Self::text(&obj, Tag(group, element)) {
                values.set(tag, value);
            }
        }

        let sop_class = Self::text(&obj, tags::SOP_CLASS_UID)
            .unwrap_or_else(|| obj.meta().media_storage_sop_class_uid.clone());
        let manufacturer = Self::text(&obj, tags::MANUFACTURER).unwrap_or_default();
        let has_rows = obj.element(tags::ROWS).is_ok();

        log::trace!("Extracted {} (SOP class {})", path.display(), sop_class.trim_end_matches('\0'));
        Ok(ExtractedMetadata::new(
            values,
            classify(&sop_class, &manufacturer, has_rows),
        ))
    }
}
