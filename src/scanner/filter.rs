//! Filename filter deciding which files are plausibly indexable.
//!
//! The same predicate is used when adding new files and when pruning cached
//! records, so a file rejected here never appears in an index file.
//!
//! A name passes when it has no extension, when its extension is on the
//! allow-list, or when its extension is not on the deny-list. Extensions are
//! compared case-insensitively. Archives are full of extension-less files
//! and numeric pseudo-extensions (`1.2.840.10008.55`), so unknown extensions
//! pass and only well-known non-DICOM formats are rejected.

use std::collections::BTreeSet;

use super::path_utils::{extension_of, name_key, names_equal};

/// Extensions that are always indexable.
pub const ALLOWED_EXTENSIONS: &[&str] = &["dcm", "dicom", "dic", "ima", "img"];

/// Common extensions that are never DICOM.
pub const DENIED_EXTENSIONS: &[&str] = &[
    "txt", "log", "ini", "cfg", "md", "rtf", "csv", "json", "xml", "htm", "html", "css", "js",
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "jpg", "jpeg", "png", "gif", "bmp", "tif",
    "tiff", "ico", "exe", "dll", "msi", "bat", "cmd", "sh", "lnk", "zip", "rar", "7z", "gz",
    "tar", "iso", "db", "mp3", "wav", "mp4", "avi", "mov", "tmp",
];

/// Names rejected regardless of extension.
pub const DENIED_FILE_NAMES: &[&str] = &[".DS_Store"];

/// Extension allow/deny filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameFilter {
    allowed: BTreeSet<String>,
    denied: BTreeSet<String>,
}

impl Default for NameFilter {
    fn default() -> Self {
        Self {
            allowed: ALLOWED_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
            denied: DENIED_EXTENSIONS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl NameFilter {
    /// Extend the built-in lists.
    ///
    /// Extensions may be given with or without a leading dot. An extension
    /// listed as allowed wins over the deny-list.
    #[must_use]
    pub fn with_extra<A, D>(mut self, allowed: A, denied: D) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        self.allowed
            .extend(allowed.into_iter().map(|e| clean_extension(e.as_ref())));
        self.denied
            .extend(denied.into_iter().map(|e| clean_extension(e.as_ref())));
        self
    }

    /// Check whether a file name is plausibly indexable.
    #[must_use]
    pub fn accepts(&self, name: &str) -> bool {
        if name.is_empty() || DENIED_FILE_NAMES.contains(&name) {
            return false;
        }
        match extension_of(name) {
            None => true,
            Some(ext) => self.allowed.contains(&ext) || !self.denied.contains(&ext),
        }
    }
}

fn clean_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Everything reconciliation needs to know about names: the filter, the
/// reserved index file names, and how to build bucket keys.
#[derive(Debug, Clone)]
pub struct NameRules {
    filter: NameFilter,
    reserved: Vec<String>,
    fold_case: bool,
}

impl NameRules {
    /// Create a rule set.
    ///
    /// # Arguments
    ///
    /// * `filter` - Extension filter
    /// * `reserved` - The index's own file names, never indexable
    /// * `fold_case` - Bucket names case-insensitively
    #[must_use]
    pub fn new<I, S>(filter: NameFilter, reserved: I, fold_case: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let reserved = reserved.into_iter().map(Into::into).collect();
        Self {
            filter,
            reserved,
            fold_case,
        }
    }

    /// Whether bucket keys are case-folded.
    #[must_use]
    pub fn fold_case(&self) -> bool {
        self.fold_case
    }

    /// Bucket key for a name.
    #[must_use]
    pub fn key(&self, name: &str) -> String {
        name_key(name, self.fold_case)
    }

    /// Whether the name is one of the index's own files.
    #[must_use]
    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved
            .iter()
            .any(|r| names_equal(r, name, self.fold_case))
    }

    /// Whether the name should be indexed at all.
    #[must_use]
    pub fn is_indexable(&self, name: &str) -> bool {
        !self.is_reserved(name) && self.filter.accepts(name)
    }
}
