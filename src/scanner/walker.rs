//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct, which lists a whole tree in
//! a single pass and returns it as a [`DirectoryTree`]. Reconciliation of a
//! directory needs its complete file listing, so the walk always finishes
//! before any index work begins.
//!
//! # Features
//!
//! - Parallel directory reading using the rayon thread pool behind jwalk
//! - Deterministic output: children are sorted by name
//! - Configurable symlink following and hidden-file skipping
//! - Graceful shutdown via atomic flag
//!
//! # Example
//!
//! ```no_run
//! use dicomcat::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/data/archive"), WalkerConfig::default());
//! let tree = walker.walk()?;
//! println!("{} directories, {} files", tree.directory_count(), tree.file_count());
//! # Ok::<(), dicomcat::scanner::ScanError>(())
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jwalk::WalkDir;

use super::{DirectoryTree, LiveFile, ScanError, WalkerConfig};

/// Directory walker producing a full [`DirectoryTree`].
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given path.
    ///
    /// # Arguments
    ///
    /// * `path` - Root directory to scan
    /// * `config` - Walker configuration options
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag is set to `true`, the walk stops and returns
    /// [`ScanError::Interrupted`].
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk the directory tree.
    ///
    /// Any error other than a file vanishing between the directory read and
    /// its stat aborts the walk: an incomplete listing would make the
    /// reconciliation delete cache entries for files that still exist.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError`] if the root is missing or not a directory, if
    /// any directory or file cannot be read, or on shutdown.
    pub fn walk(&self) -> Result<DirectoryTree, ScanError> {
        let root_meta = std::fs::metadata(&self.root).map_err(|e| self.map_io_error(&self.root, e))?;
        if !root_meta.is_dir() {
            return Err(ScanError::NotADirectory(self.root.clone()));
        }

        let mut files_by_dir: BTreeMap<PathBuf, Vec<LiveFile>> = BTreeMap::new();
        files_by_dir.insert(self.root.clone(), Vec::new());

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(|_depth, _path, _read_dir_state, children| {
                // Sort children for deterministic output
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        for entry_result in walk_dir {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping walk");
                return Err(ScanError::Interrupted);
            }

            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    return Err(ScanError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    });
                }
            };

            let path = entry.path();
            let file_type = entry.file_type();

            if file_type.is_dir() {
                files_by_dir.entry(path).or_default();
                continue;
            }

            if file_type.is_symlink() && !self.config.follow_symlinks {
                log::trace!("Skipping symlink: {}", path.display());
                continue;
            }

            let metadata = if self.config.follow_symlinks {
                std::fs::metadata(&path)
            } else {
                std::fs::symlink_metadata(&path)
            };
            let metadata = match metadata {
                Ok(m) => m,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    log::debug!("File vanished during walk: {}", path.display());
                    continue;
                }
                Err(e) => return Err(self.map_io_error(&path, e)),
            };

            if metadata.is_dir() {
                // A followed symlink to a directory; jwalk descends into it.
                files_by_dir.entry(path).or_default();
                continue;
            }
            if !metadata.is_file() {
                continue;
            }

            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                log::warn!("Skipping file with non UTF-8 name: {}", path.display());
                continue;
            };
            let modified = metadata
                .modified()
                .map_err(|e| self.map_io_error(&path, e))?;
            let parent = path.parent().map_or_else(|| self.root.clone(), Path::to_path_buf);

            log::trace!("Listed {} ({} bytes)", path.display(), metadata.len());
            files_by_dir
                .entry(parent)
                .or_default()
                .push(LiveFile::with_time(name, metadata.len(), modified));
        }

        Ok(assemble_tree(&self.root, files_by_dir))
    }

    fn map_io_error(&self, path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }
}

/// Turn the flat directory map into a tree rooted at `root`.
fn assemble_tree(root: &Path, mut files_by_dir: BTreeMap<PathBuf, Vec<LiveFile>>) -> DirectoryTree {
    let mut children: BTreeMap<PathBuf, Vec<PathBuf>> = BTreeMap::new();
    for dir in files_by_dir.keys() {
        if dir.as_path() == root {
            continue;
        }
        if let Some(parent) = dir.parent() {
            children
                .entry(parent.to_path_buf())
                .or_default()
                .push(dir.clone());
        }
    }

    fn build(
        path: &Path,
        files_by_dir: &mut BTreeMap<PathBuf, Vec<LiveFile>>,
        children: &BTreeMap<PathBuf, Vec<PathBuf>>,
    ) -> DirectoryTree {
        let mut files = files_by_dir.remove(path).unwrap_or_default();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        let subdirectories = children
            .get(path)
            .map(|subs| {
                subs.iter()
                    .map(|sub| build(sub, files_by_dir, children))
                    .collect()
            })
            .unwrap_or_default();
        DirectoryTree {
            path: path.to_path_buf(),
            files,
            subdirectories,
        }
    }

    build(root, &mut files_by_dir, &children)
}
