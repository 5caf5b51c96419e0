//! Image classification flags.
//!
//! Instances are classified over a small closed hierarchy:
//!
//! ```text
//! image
//! ├── tomogram_slice
//! │   ├── ct_slice
//! │   └── mr_slice
//! │       └── mr_slice_siemens
//! └── xray_image
//! ```
//!
//! A [`Classification`] is a flag set that is always closed under this
//! hierarchy: inserting a kind also inserts all of its ancestors, so a CT
//! slice is always a tomogram slice and always an image.

use std::fmt;

/// One node of the classification hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImageKind {
    /// Any image-bearing instance
    Image,
    /// A slice of a tomographic volume
    TomogramSlice,
    /// Computed tomography slice
    CtSlice,
    /// Magnetic resonance slice
    MrSlice,
    /// Vendor MR layout needing special handling (Siemens mosaic)
    MrSliceSiemens,
    /// Projection radiograph
    XrayImage,
}

impl ImageKind {
    /// All kinds, parents before children.
    pub const ALL: [ImageKind; 6] = [
        ImageKind::Image,
        ImageKind::TomogramSlice,
        ImageKind::CtSlice,
        ImageKind::MrSlice,
        ImageKind::MrSliceSiemens,
        ImageKind::XrayImage,
    ];

    /// Direct parent in the hierarchy.
    #[must_use]
    pub const fn parent(self) -> Option<ImageKind> {
        match self {
            ImageKind::Image => None,
            ImageKind::TomogramSlice | ImageKind::XrayImage => Some(ImageKind::Image),
            ImageKind::CtSlice | ImageKind::MrSlice => Some(ImageKind::TomogramSlice),
            ImageKind::MrSliceSiemens => Some(ImageKind::MrSlice),
        }
    }

    /// Persisted name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            ImageKind::Image => "image",
            ImageKind::TomogramSlice => "tomogram_slice",
            ImageKind::CtSlice => "ct_slice",
            ImageKind::MrSlice => "mr_slice",
            ImageKind::MrSliceSiemens => "mr_slice_siemens",
            ImageKind::XrayImage => "xray_image",
        }
    }

    /// Parse a persisted name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown classification name in a persisted index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown image type \"{0}\"")]
pub struct UnknownImageKind(pub String);

/// Set of classification flags, closed under the hierarchy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Classification {
    bits: u8,
}

impl Classification {
    /// No classification (non-image instance).
    pub const NONE: Classification = Classification { bits: 0 };

    /// Classification of a single kind, ancestors included.
    #[must_use]
    pub fn of(kind: ImageKind) -> Self {
        let mut c = Self::NONE;
        c.insert(kind);
        c
    }

    /// Add a kind and all of its ancestors.
    pub fn insert(&mut self, kind: ImageKind) {
        let mut current = Some(kind);
        while let Some(k) = current {
            self.bits |= k.bit();
            current = k.parent();
        }
    }

    /// Whether the flag for `kind` is set.
    #[must_use]
    pub fn contains(self, kind: ImageKind) -> bool {
        self.bits & kind.bit() != 0
    }

    /// Whether no flag is set.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Set flags, parents before children.
    pub fn kinds(self) -> impl Iterator<Item = ImageKind> {
        ImageKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }

    /// Names of set flags, for persistence.
    #[must_use]
    pub fn names(self) -> Vec<String> {
        self.kinds().map(|k| k.name().to_string()).collect()
    }

    /// Rebuild from persisted names; ancestors are implied.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownImageKind`] for a name outside the hierarchy.
    pub fn from_names<I, S>(names: I) -> Result<Self, UnknownImageKind>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut c = Self::NONE;
        for name in names {
            let name = name.as_ref();
            let kind =
                ImageKind::from_name(name).ok_or_else(|| UnknownImageKind(name.to_string()))?;
            c.insert(kind);
        }
        Ok(c)
    }

    /// Every set flag has its parent set too.
    ///
    /// Always true for values built through this API.
    #[must_use]
    pub fn is_closed(self) -> bool {
        self.kinds()
            .all(|k| k.parent().is_none_or(|p| self.contains(p)))
    }
}

impl FromIterator<ImageKind> for Classification {
    fn from_iter<T: IntoIterator<Item = ImageKind>>(iter: T) -> Self {
        let mut c = Self::NONE;
        for kind in iter {
            c.insert(kind);
        }
        c
    }
}
