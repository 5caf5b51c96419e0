use dicomcat::catalog::{CatalogConfig, CatalogError};
use dicomcat::codec::{CodecError, Layout};
use dicomcat::index::VerifyError;
use std::fs;
use tempfile::TempDir;

use crate::support::{archive, indexer, write_file, write_file_at, CountingExtractor, MTIME};

fn indexed_archive() -> (TempDir, std::sync::Arc<CountingExtractor>) {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();
    extractor.reset();
    (dir, extractor)
}

fn verify_error(dir: &TempDir, extractor: &std::sync::Arc<CountingExtractor>) -> CatalogError {
    match indexer(CatalogConfig::default(), extractor).verify(dir.path()) {
        Ok(catalog) => panic!("Expected verify failure, got {}", catalog.stats),
        Err(e) => e,
    }
}

#[test]
fn test_verify_after_update_succeeds() {
    let (dir, extractor) = indexed_archive();

    let catalog = indexer(CatalogConfig::default(), &extractor)
        .verify(dir.path())
        .unwrap();

    assert_eq!(catalog.stats.files_verified, 4);
    assert_eq!(catalog.stats.directories_visited, 4);
    assert_eq!(catalog.stats.directories_indexed, 3);
    assert_eq!(catalog.dicom_count(), 3);
    assert_eq!(extractor.calls(), 0);
}

#[test]
fn test_verify_writes_nothing() {
    let (dir, extractor) = indexed_archive();
    let s1 = dir.path().join("P1/S1");
    fs::remove_file(Layout::Plain.path_in(&s1)).unwrap();
    let before = fs::read(Layout::Hierarchical.path_in(&s1)).unwrap();

    indexer(CatalogConfig::default(), &extractor)
        .verify(dir.path())
        .unwrap();

    assert!(!Layout::Plain.path_in(&s1).exists());
    assert_eq!(fs::read(Layout::Hierarchical.path_in(&s1)).unwrap(), before);
}

#[test]
fn test_verify_reports_new_file() {
    let (dir, extractor) = indexed_archive();
    write_file(dir.path(), "P1/S2/IM0005", "DICM P1");

    match verify_error(&dir, &extractor) {
        CatalogError::Verify(VerifyError::MissingFromCache {
            directory,
            file_name,
        }) => {
            assert_eq!(directory, dir.path().join("P1/S2"));
            assert_eq!(file_name, "IM0005");
        }
        other => panic!("Unexpected error: {}", other),
    }
    assert_eq!(extractor.calls(), 0);
}

#[test]
fn test_verify_reports_deleted_file() {
    let (dir, extractor) = indexed_archive();
    fs::remove_file(dir.path().join("P1/README")).unwrap();

    match verify_error(&dir, &extractor) {
        CatalogError::Verify(VerifyError::MissingFromDisk { file_name, .. }) => {
            assert_eq!(file_name, "README");
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn test_verify_reports_changed_file() {
    let (dir, extractor) = indexed_archive();
    write_file_at(dir.path(), "P1/S1/IM0002", "DICM P1", MTIME + 3600);

    match verify_error(&dir, &extractor) {
        CatalogError::Verify(VerifyError::Mismatch {
            file_name,
            cached_size,
            live_size,
            cached_modified,
            live_modified,
            ..
        }) => {
            assert_eq!(file_name, "IM0002");
            assert_eq!(cached_size, live_size);
            assert_eq!(cached_modified, "2024-01-02T03:04:05Z");
            assert_eq!(live_modified, "2024-01-02T04:04:05Z");
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn test_verify_unindexed_directory_fails() {
    let (dir, extractor) = indexed_archive();
    write_file(dir.path(), "P2/IM0001", "DICM P2");

    let err = verify_error(&dir, &extractor);
    match err {
        CatalogError::Verify(e) => {
            assert_eq!(e.directory(), dir.path().join("P2"));
            assert_eq!(e.file_name(), "IM0001");
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn test_verify_fails_on_unreadable_layout_next_to_valid_one() {
    let (dir, extractor) = indexed_archive();
    let s1 = dir.path().join("P1/S1");
    fs::write(Layout::Hierarchical.path_in(&s1), "{ not json").unwrap();

    match verify_error(&dir, &extractor) {
        CatalogError::Codec(CodecError::Parse { path, .. }) => {
            assert_eq!(path, Layout::Hierarchical.path_in(&s1));
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn test_verify_checks_every_layout() {
    let (dir, extractor) = indexed_archive();
    let plain = Layout::Plain.path_in(&dir.path().join("P1/S1"));
    let content = fs::read_to_string(&plain).unwrap();
    fs::write(&plain, content.replacen("\"size\": 7", "\"size\": 999", 1)).unwrap();

    match verify_error(&dir, &extractor) {
        CatalogError::Verify(VerifyError::Mismatch {
            file_name,
            cached_size,
            live_size,
            ..
        }) => {
            assert_eq!(file_name, "IM0001");
            assert_eq!(cached_size, 999);
            assert_eq!(live_size, 7);
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn test_verify_fails_when_every_layout_is_unreadable() {
    let (dir, extractor) = indexed_archive();
    let s2 = dir.path().join("P1/S2");
    fs::write(Layout::Hierarchical.path_in(&s2), "garbage").unwrap();
    fs::write(Layout::Plain.path_in(&s2), "{\"id\": \"something else\"}").unwrap();

    match verify_error(&dir, &extractor) {
        CatalogError::Codec(CodecError::Parse { path, .. }) => {
            assert_eq!(path, Layout::Hierarchical.path_in(&s2));
        }
        other => panic!("Unexpected error: {}", other),
    }
}

#[test]
fn test_verify_ignores_files_never_indexed() {
    let (dir, extractor) = indexed_archive();
    write_file(dir.path(), "P1/S1/thumbnail.jpg", "jpeg");
    write_file(dir.path(), "P1/.DS_Store", "finder");

    assert!(indexer(CatalogConfig::default(), &extractor)
        .verify(dir.path())
        .is_ok());
}

#[test]
fn test_verify_empty_tree() {
    let dir = TempDir::new().unwrap();
    let extractor = CountingExtractor::new();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .verify(dir.path())
        .unwrap();
    assert!(catalog.directories.is_empty());
    assert_eq!(catalog.stats.directories_visited, 1);
}
