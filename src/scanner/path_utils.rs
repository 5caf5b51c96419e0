//! File name normalization for cache-vs-disk matching.
//!
//! Index files travel between machines. A catalog written on a
//! case-sensitive Linux volume may be read back from a case-insensitive
//! Windows share, and macOS stores names in NFD (decomposed) form while
//! Windows and Linux typically use NFC:
//!
//! - NFC: `café.dcm` - 'é' is U+00E9 (single code point)
//! - NFD: `café.dcm` - 'e' U+0065 + combining acute accent U+0301
//!
//! Reconciliation therefore buckets names by a *normalized key*: NFC first,
//! then (optionally) Unicode lower-casing. Two names sharing a key are
//! candidates for the same file.
//!
//! # Example
//!
//! ```
//! use dicomcat::scanner::path_utils::{name_key, names_equal};
//!
//! assert_eq!(name_key("IM0001.DCM", true), "im0001.dcm");
//! assert!(names_equal("cafe\u{0301}.dcm", "CAFÉ.dcm", true));
//! assert!(!names_equal("a.dcm", "A.dcm", false));
//! ```

use std::borrow::Cow;

use unicode_normalization::UnicodeNormalization;

/// Normalize a file name to NFC (Composed) form.
///
/// # Example
///
/// ```
/// use dicomcat::scanner::path_utils::normalize_nfc;
///
/// let nfd = "cafe\u{0301}.dcm"; // NFD form
/// assert_eq!(normalize_nfc(nfd), "café.dcm");
/// ```
#[must_use]
pub fn normalize_nfc(s: &str) -> Cow<'_, str> {
    if unicode_normalization::is_nfc(s) {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.nfc().collect())
    }
}

/// Build the bucket key for a file name.
///
/// # Arguments
///
/// * `name` - Base file name
/// * `fold_case` - Whether to lower-case after NFC normalization
#[must_use]
pub fn name_key(name: &str, fold_case: bool) -> String {
    let nfc = normalize_nfc(name);
    if fold_case {
        nfc.to_lowercase()
    } else {
        nfc.into_owned()
    }
}

/// Check if two file names map to the same bucket key.
#[must_use]
pub fn names_equal(a: &str, b: &str, fold_case: bool) -> bool {
    a == b || name_key(a, fold_case) == name_key(b, fold_case)
}

/// Lower-cased extension of a file name, without the dot.
///
/// Returns `None` for names without an extension, including dot-files such
/// as `.DS_Store` and names ending in a dot.
///
/// # Example
///
/// ```
/// use dicomcat::scanner::path_utils::extension_of;
///
/// assert_eq!(extension_of("IM001.DCM").as_deref(), Some("dcm"));
/// assert_eq!(extension_of("IM001"), None);
/// assert_eq!(extension_of(".hidden"), None);
/// ```
#[must_use]
pub fn extension_of(name: &str) -> Option<String> {
    let stem_end = name.rfind('.')?;
    if stem_end == 0 || stem_end + 1 == name.len() {
        return None;
    }
    Some(name[stem_end + 1..].to_lowercase())
}
