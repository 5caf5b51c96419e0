//! Per-directory cache and its reconciliation against the live listing.
//!
//! [`DirectoryIndex::update`] runs in three phases:
//!
//! 1. **Plan**: cached records and live files are bucketed by normalized
//!    name and every bucket is resolved into keep / rename / refresh /
//!    delete / add decisions. No I/O happens here.
//! 2. **Extract**: refreshes and additions go through the
//!    [`MetadataExtractor`] on the rayon pool.
//! 3. **Apply**: only when every extraction succeeded is the new record set
//!    swapped in and the statistics merged.
//!
//! A failed update therefore leaves the index exactly as it was.
//!
//! # Rename scoring
//!
//! Case folding can put several cached records in one bucket. Each
//! (live file, cached record) pair is scored
//!
//! ```text
//! 1 + 2·[size matches] + 1·[mtime matches] + 4·[exact name matches]
//! ```
//!
//! and pairs are taken greedily by descending score. Ties go to the live
//! file, then the cached record, that sorts first by name.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::extract::MetadataExtractor;
use crate::scanner::{LiveFile, NameRules};

use super::{DicomState, ExtractPolicy, FileRecord, IndexStats, RecordError};

/// Highest possible rename score: size, mtime and exact name all match.
pub const MAX_SCORE: u8 = 8;

/// Score a cached record against a live file.
#[must_use]
pub fn rename_score(record: &FileRecord, live: &LiveFile) -> u8 {
    1 + 2 * u8::from(record.file_size() == live.size)
        + u8::from(record.modified() == live.modified)
        + 4 * u8::from(record.file_name() == live.name)
}

/// A failed update of one directory.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// A mandatory extraction failed.
    #[error("cannot update index of {directory}: {source}")]
    Extraction {
        /// Directory being updated
        directory: PathBuf,
        /// The failing file
        #[source]
        source: RecordError,
    },
}

/// The cache disagrees with the directory.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// A file on disk has no cached record.
    #[error("{file_name} in {directory} is missing from the index")]
    MissingFromCache {
        /// Directory being verified
        directory: PathBuf,
        /// File name
        file_name: String,
    },

    /// A cached record has no file on disk.
    #[error("{file_name} in {directory} is indexed but missing from disk")]
    MissingFromDisk {
        /// Directory being verified
        directory: PathBuf,
        /// File name
        file_name: String,
    },

    /// Size or modification time differ.
    #[error(
        "{file_name} in {directory} changed: indexed {cached_size} bytes at {cached_modified}, \
         found {live_size} bytes at {live_modified}"
    )]
    Mismatch {
        /// Directory being verified
        directory: PathBuf,
        /// File name
        file_name: String,
        /// Cached size
        cached_size: u64,
        /// Cached modification time
        cached_modified: String,
        /// Size on disk
        live_size: u64,
        /// Modification time on disk
        live_modified: String,
    },
}

impl VerifyError {
    /// Name of the offending file.
    #[must_use]
    pub fn file_name(&self) -> &str {
        match self {
            VerifyError::MissingFromCache { file_name, .. }
            | VerifyError::MissingFromDisk { file_name, .. }
            | VerifyError::Mismatch { file_name, .. } => file_name,
        }
    }

    /// Directory being verified.
    #[must_use]
    pub fn directory(&self) -> &Path {
        match self {
            VerifyError::MissingFromCache { directory, .. }
            | VerifyError::MissingFromDisk { directory, .. }
            | VerifyError::Mismatch { directory, .. } => directory,
        }
    }
}

/// Decision for one cached record or live file, before any I/O.
#[derive(Debug)]
enum Plan<'a> {
    Keep(usize),
    Rename(usize, &'a str),
    Refresh(usize, &'a str, ExtractPolicy),
    Delete(usize),
    Add(&'a str),
}

/// A plan entry after extraction.
enum Step {
    Keep(usize),
    Rename(usize, String),
    Replace(usize, FileRecord),
    Delete(usize),
    Add(FileRecord),
}

/// Cached records of one directory, sorted by file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryIndex {
    path: PathBuf,
    records: Vec<FileRecord>,
}

impl DirectoryIndex {
    /// Create an empty index for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    /// Create an index from existing records.
    #[must_use]
    pub fn from_records(path: impl Into<PathBuf>, mut records: Vec<FileRecord>) -> Self {
        records.sort_by(|a, b| a.file_name().cmp(b.file_name()));
        Self {
            path: path.into(),
            records,
        }
    }

    /// Directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records, sorted by file name.
    #[must_use]
    pub fn records(&self) -> &[FileRecord] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index holds no record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record with exactly this name.
    #[must_use]
    pub fn get(&self, file_name: &str) -> Option<&FileRecord> {
        self.records
            .binary_search_by(|r| r.file_name().cmp(file_name))
            .ok()
            .map(|i| &self.records[i])
    }

    /// Number of DICOM records.
    #[must_use]
    pub fn dicom_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_dicom()).count()
    }

    /// Force a refresh of one record on the next update.
    ///
    /// Returns `false` when no record has this name.
    pub fn mark_for_reindexing(&mut self, file_name: &str) -> bool {
        match self
            .records
            .binary_search_by(|r| r.file_name().cmp(file_name))
        {
            Ok(i) => {
                self.records[i].mark_for_reindexing();
                true
            }
            Err(_) => false,
        }
    }

    /// Force a refresh of every record on the next update.
    pub fn mark_all_for_reindexing(&mut self) {
        for record in &mut self.records {
            record.mark_for_reindexing();
        }
    }

    /// Reconcile the cache with the live listing of the directory.
    ///
    /// Returns whether anything was added, deleted or changed. On error the
    /// index and `stats` are left untouched.
    ///
    /// # Errors
    ///
    /// [`IndexError::Extraction`] when a file that must be (re)read cannot
    /// be stat'ed or extracted.
    pub fn update(
        &mut self,
        live: &[LiveFile],
        rules: &NameRules,
        extractor: &dyn MetadataExtractor,
        stats: &mut IndexStats,
    ) -> Result<bool, IndexError> {
        let plan = self.plan(live, rules);

        let steps = plan
            .par_iter()
            .map(|entry| self.execute(entry, extractor))
            .collect::<Vec<_>>()
            .into_iter()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| IndexError::Extraction {
                directory: self.path.clone(),
                source,
            })?;

        let mut local = IndexStats::default();
        let mut modified = false;
        let mut records = Vec::with_capacity(steps.len());
        for step in steps {
            match step {
                Step::Keep(i) => records.push(self.records[i].clone()),
                Step::Rename(i, name) => {
                    records.push(self.records[i].renamed(&name));
                    modified = true;
                }
                Step::Replace(i, record) => {
                    local.record_replaced(self.records[i].dicom_state(), record.dicom_state());
                    records.push(record);
                    modified = true;
                }
                Step::Delete(i) => {
                    local.record_deleted(self.records[i].dicom_state());
                    modified = true;
                }
                Step::Add(record) => {
                    local.record_added(record.dicom_state());
                    records.push(record);
                    modified = true;
                }
            }
        }
        records.sort_by(|a, b| a.file_name().cmp(b.file_name()));

        log::debug!(
            "{}: {} records, {} changes",
            self.path.display(),
            records.len(),
            local.total_changes()
        );
        self.records = records;
        stats.merge(&local);
        Ok(modified)
    }

    /// Read-only check that the cache matches the live listing exactly.
    ///
    /// Every indexable live file must have a record with the same name,
    /// size and modification time, and every record must have a live file.
    ///
    /// # Errors
    ///
    /// The first [`VerifyError`] found, live files checked in name order
    /// before records.
    pub fn check_up_to_date(&self, live: &[LiveFile], rules: &NameRules) -> Result<(), VerifyError> {
        let mut files: Vec<&LiveFile> = live.iter().filter(|f| rules.is_indexable(&f.name)).collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));

        for file in &files {
            match self.get(&file.name) {
                None => {
                    return Err(VerifyError::MissingFromCache {
                        directory: self.path.clone(),
                        file_name: file.name.clone(),
                    })
                }
                Some(record) if !record.matches_filesystem(file.size, &file.modified) => {
                    return Err(VerifyError::Mismatch {
                        directory: self.path.clone(),
                        file_name: file.name.clone(),
                        cached_size: record.file_size(),
                        cached_modified: record.modified().to_string(),
                        live_size: file.size,
                        live_modified: file.modified.clone(),
                    })
                }
                Some(_) => {}
            }
        }

        let on_disk: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
        if let Some(record) = self
            .records
            .iter()
            .find(|r| !on_disk.contains(r.file_name()))
        {
            return Err(VerifyError::MissingFromDisk {
                directory: self.path.clone(),
                file_name: record.file_name().to_string(),
            });
        }
        Ok(())
    }

    fn plan<'a>(&self, live: &'a [LiveFile], rules: &NameRules) -> Vec<Plan<'a>> {
        let mut cached: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (i, record) in self.records.iter().enumerate() {
            cached.entry(rules.key(record.file_name())).or_default().push(i);
        }
        for bucket in cached.values_mut() {
            bucket.sort_by(|a, b| self.records[*a].file_name().cmp(self.records[*b].file_name()));
        }

        let mut live_buckets: BTreeMap<String, Vec<&'a LiveFile>> = BTreeMap::new();
        for file in live {
            live_buckets.entry(rules.key(&file.name)).or_default().push(file);
        }
        for bucket in live_buckets.values_mut() {
            bucket.sort_by(|a, b| a.name.cmp(&b.name));
        }

        let mut plan = Vec::new();
        for (key, candidates) in &cached {
            let files = live_buckets.remove(key);
            let indexable = rules.is_indexable(self.records[candidates[0]].file_name());
            match files {
                Some(files) if indexable => self.plan_bucket(candidates, &files, rules, &mut plan),
                _ => {
                    for &i in candidates {
                        log::trace!("delete {}", self.records[i].file_name());
                        plan.push(Plan::Delete(i));
                    }
                }
            }
        }

        for file in live_buckets.into_values().flatten() {
            if rules.is_indexable(&file.name) {
                log::trace!("add {}", file.name);
                plan.push(Plan::Add(&file.name));
            }
        }
        plan
    }

    fn plan_bucket<'a>(
        &self,
        candidates: &[usize],
        files: &[&'a LiveFile],
        rules: &NameRules,
        plan: &mut Vec<Plan<'a>>,
    ) {
        let files: Vec<&'a LiveFile> = files
            .iter()
            .copied()
            .filter(|f| rules.is_indexable(&f.name))
            .collect();

        let mut pairs = Vec::with_capacity(files.len() * candidates.len());
        for (fi, file) in files.iter().enumerate() {
            for (ci, &i) in candidates.iter().enumerate() {
                pairs.push((rename_score(&self.records[i], file), fi, ci));
            }
        }
        pairs.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let single = candidates.len() == 1;
        let mut file_taken = vec![false; files.len()];
        let mut candidate_taken = vec![false; candidates.len()];
        for (score, fi, ci) in pairs {
            if file_taken[fi] || candidate_taken[ci] {
                continue;
            }
            file_taken[fi] = true;
            candidate_taken[ci] = true;
            plan.push(self.decide(candidates[ci], files[fi], score, single));
        }

        for (ci, &i) in candidates.iter().enumerate() {
            if !candidate_taken[ci] {
                log::trace!("delete {} (superseded)", self.records[i].file_name());
                plan.push(Plan::Delete(i));
            }
        }
        for (fi, file) in files.iter().enumerate() {
            if !file_taken[fi] {
                log::trace!("add {}", file.name);
                plan.push(Plan::Add(&file.name));
            }
        }
    }

    fn decide<'a>(&self, i: usize, file: &'a LiveFile, score: u8, single: bool) -> Plan<'a> {
        let record = &self.records[i];
        let policy = if record.is_dicom() {
            ExtractPolicy::Strict
        } else {
            ExtractPolicy::Lenient
        };

        let fresh = if single {
            record.matches_filesystem(file.size, &file.modified)
        } else {
            score == MAX_SCORE
        };

        if record.needs_reindexing() || record.dicom_state() == DicomState::Unknown || !fresh {
            log::trace!("refresh {} (score {})", file.name, score);
            Plan::Refresh(i, &file.name, policy)
        } else if record.file_name() != file.name {
            log::trace!("rename {} -> {}", record.file_name(), file.name);
            Plan::Rename(i, &file.name)
        } else {
            Plan::Keep(i)
        }
    }

    fn execute(&self, entry: &Plan<'_>, extractor: &dyn MetadataExtractor) -> Result<Step, RecordError> {
        Ok(match *entry {
            Plan::Keep(i) => Step::Keep(i),
            Plan::Rename(i, name) => Step::Rename(i, name.to_string()),
            Plan::Delete(i) => Step::Delete(i),
            Plan::Refresh(i, name, policy) => {
                Step::Replace(i, FileRecord::extract(&self.path, name, extractor, policy)?)
            }
            Plan::Add(name) => Step::Add(FileRecord::extract(
                &self.path,
                name,
                extractor,
                ExtractPolicy::Lenient,
            )?),
        })
    }
}
