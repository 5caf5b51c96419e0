//! Processing of a single directory in update and verify mode.

use crate::codec::{self, Layout, WriteMode};
use crate::extract::MetadataExtractor;
use crate::index::DirectoryIndex;
use crate::scanner::{DirectoryListing, NameRules};

use super::{CatalogError, CatalogStats};

/// Everything a directory task needs, shared by all tasks of a run.
pub(super) struct Context<'a> {
    pub rules: &'a NameRules,
    pub extractor: &'a dyn MetadataExtractor,
    pub write_mode: WriteMode,
    pub force: bool,
}

/// Result of one directory: the index to keep in the catalog (if not
/// empty) and the directory's counters.
pub(super) type Processed = (Option<DirectoryIndex>, CatalogStats);

/// Layouts whose reserved file was listed in the directory.
fn present_layouts(listing: &DirectoryListing) -> Vec<Layout> {
    Layout::ALL
        .into_iter()
        .filter(|l| listing.contains(l.file_name()))
        .collect()
}

/// Load, reconcile and persist the index of one directory.
///
/// The first readable layout (hierarchical before plain) is reconciled.
/// Unreadable index files are logged and rewritten; when none is readable
/// the directory is rebuilt from scratch. Write failures are logged and
/// counted but do not fail the directory: the in-memory index is still
/// returned and the next run retries the write.
pub(super) fn update_directory(
    listing: &DirectoryListing,
    ctx: &Context<'_>,
) -> Result<Processed, CatalogError> {
    let dir = listing.path.as_path();
    let mut stats = CatalogStats {
        directories_visited: 1,
        ..Default::default()
    };

    let present = present_layouts(listing);
    let mut unreadable = Vec::new();
    let mut loaded = None;
    for &layout in &present {
        match codec::load(dir, layout) {
            Ok(index) if loaded.is_none() => {
                log::debug!("Loaded {} records from {}", index.len(), layout.path_in(dir).display());
                loaded = Some(index);
            }
            Ok(_) => {}
            Err(e) => {
                log::warn!("Ignoring unreadable index: {}", e);
                unreadable.push(layout);
            }
        }
    }

    let mut index = loaded.unwrap_or_else(|| DirectoryIndex::new(dir));
    if ctx.force {
        index.mark_all_for_reindexing();
    }
    let modified = index.update(&listing.files, ctx.rules, ctx.extractor, &mut stats.records)?;

    if index.is_empty() {
        for &layout in &present {
            remove_layout(dir, layout, &mut stats);
        }
        return Ok((None, stats));
    }

    for &layout in &present {
        if !ctx.write_mode.includes(layout) {
            remove_layout(dir, layout, &mut stats);
        }
    }
    for layout in ctx.write_mode.layouts() {
        let on_disk = present.contains(&layout);
        if !(modified || !on_disk || unreadable.contains(&layout)) {
            continue;
        }
        match codec::save(&index, layout) {
            Ok(_) if on_disk => stats.index_files_modified += 1,
            Ok(_) => stats.index_files_created += 1,
            Err(e) => {
                log::warn!("{}", e);
                stats.write_failures += 1;
            }
        }
    }

    stats.directories_indexed = 1;
    Ok((Some(index), stats))
}

fn remove_layout(dir: &std::path::Path, layout: Layout, stats: &mut CatalogStats) {
    match codec::remove(dir, layout) {
        Ok(true) => {
            log::debug!("Removed {}", layout.path_in(dir).display());
            stats.index_files_deleted += 1;
        }
        Ok(false) => {}
        Err(e) => {
            log::warn!("{}", e);
            stats.write_failures += 1;
        }
    }
}

/// Check the persisted index of one directory against its listing.
///
/// Every present layout must load and match the disk. A directory without
/// any index file is checked against an empty index.
pub(super) fn verify_directory(
    listing: &DirectoryListing,
    rules: &NameRules,
) -> Result<Processed, CatalogError> {
    let dir = listing.path.as_path();
    let mut first = None;
    for layout in present_layouts(listing) {
        let index = codec::load(dir, layout)?;
        index.check_up_to_date(&listing.files, rules)?;
        first.get_or_insert(index);
    }
    let index = match first {
        Some(index) => index,
        None => {
            let empty = DirectoryIndex::new(dir);
            empty.check_up_to_date(&listing.files, rules)?;
            empty
        }
    };

    let stats = CatalogStats {
        directories_visited: 1,
        directories_indexed: usize::from(!index.is_empty()),
        files_verified: listing
            .files
            .iter()
            .filter(|f| rules.is_indexable(&f.name))
            .count(),
        ..Default::default()
    };
    Ok(((!index.is_empty()).then_some(index), stats))
}
