//! Per-record change counters.

use serde::Serialize;

use super::DicomState;

/// Added / modified / deleted entry counts, split by DICOM state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    /// DICOM entries added
    pub added_dicom: usize,
    /// Non-DICOM entries added
    pub added_non_dicom: usize,
    /// DICOM entries refreshed in place
    pub modified_dicom: usize,
    /// Non-DICOM entries refreshed in place
    pub modified_non_dicom: usize,
    /// DICOM entries removed
    pub deleted_dicom: usize,
    /// Non-DICOM entries removed
    pub deleted_non_dicom: usize,
}

impl IndexStats {
    /// Count a new entry.
    pub fn record_added(&mut self, state: DicomState) {
        match state {
            DicomState::Dicom => self.added_dicom += 1,
            DicomState::NotDicom => self.added_non_dicom += 1,
            DicomState::Unknown => {}
        }
    }

    /// Count a removed entry.
    pub fn record_deleted(&mut self, state: DicomState) {
        match state {
            DicomState::Dicom => self.deleted_dicom += 1,
            DicomState::NotDicom => self.deleted_non_dicom += 1,
            DicomState::Unknown => {}
        }
    }

    /// Count a refreshed entry.
    ///
    /// A change of DICOM state is a delete of the old kind plus an add of the
    /// new kind, not a modification.
    pub fn record_replaced(&mut self, old: DicomState, new: DicomState) {
        match (old, new) {
            (DicomState::Dicom, DicomState::Dicom) => self.modified_dicom += 1,
            (DicomState::NotDicom, DicomState::NotDicom) => self.modified_non_dicom += 1,
            (old, new) => {
                self.record_deleted(old);
                self.record_added(new);
            }
        }
    }

    /// Add another set of counters into this one.
    pub fn merge(&mut self, other: &IndexStats) {
        self.added_dicom += other.added_dicom;
        self.added_non_dicom += other.added_non_dicom;
        self.modified_dicom += other.modified_dicom;
        self.modified_non_dicom += other.modified_non_dicom;
        self.deleted_dicom += other.deleted_dicom;
        self.deleted_non_dicom += other.deleted_non_dicom;
    }

    /// Sum of all counters.
    #[must_use]
    pub fn total_changes(&self) -> usize {
        self.added_dicom
            + self.added_non_dicom
            + self.modified_dicom
            + self.modified_non_dicom
            + self.deleted_dicom
            + self.deleted_non_dicom
    }
}
