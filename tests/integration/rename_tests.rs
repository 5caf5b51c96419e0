use dicomcat::catalog::CatalogConfig;
use dicomcat::codec::Layout;
use dicomcat::index::{DicomTag, Provenance};
use std::fs;
use tempfile::TempDir;

use crate::support::{indexer, write_file, write_file_at, CountingExtractor, MTIME};

fn series() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "IM0001", "DICM P1");
    write_file(dir.path(), "IM0002", "DICM P1");
    dir
}

#[test]
fn test_case_only_rename_keeps_metadata() {
    let dir = series();
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    fs::rename(dir.path().join("IM0001"), dir.path().join("im0001")).unwrap();
    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.calls(), 0);
    assert_eq!(catalog.stats.records.total_changes(), 0);
    assert_eq!(catalog.stats.index_files_modified, 2);

    let index = catalog.get(dir.path()).unwrap();
    assert!(index.get("IM0001").is_none());
    let record = index.get("im0001").unwrap();
    assert_eq!(record.provenance(), Provenance::Cached);
    assert_eq!(record.tags().unwrap().get(DicomTag::PatientId), "P1");

    let reloaded = dicomcat::codec::load(dir.path(), Layout::Plain).unwrap();
    assert!(reloaded.get("im0001").is_some());
}

#[test]
fn test_case_only_rename_with_new_content_is_reread() {
    let dir = series();
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    fs::remove_file(dir.path().join("IM0001")).unwrap();
    write_file_at(dir.path(), "im0001", "DICM P9", MTIME + 1);
    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.seen(), vec!["im0001"]);
    assert_eq!(catalog.stats.records.modified_dicom, 1);
    let record = catalog.get(dir.path()).unwrap().get("im0001").unwrap();
    assert_eq!(record.tags().unwrap().get(DicomTag::PatientId), "P9");
}

#[test]
fn test_case_sensitive_names_are_not_matched() {
    let dir = series();
    let extractor = CountingExtractor::new();
    let config = || CatalogConfig::default().with_fold_case(false);
    indexer(config(), &extractor).update(dir.path()).unwrap();

    fs::rename(dir.path().join("IM0001"), dir.path().join("im0001")).unwrap();
    extractor.reset();
    let catalog = indexer(config(), &extractor).update(dir.path()).unwrap();

    assert_eq!(extractor.seen(), vec!["im0001"]);
    assert_eq!(catalog.stats.records.deleted_dicom, 1);
    assert_eq!(catalog.stats.records.added_dicom, 1);
}

#[test]
fn test_unicode_normalization_rename() {
    let dir = TempDir::new().unwrap();
    let decomposed = "Se\u{301}rie_1";
    let composed = "S\u{e9}rie_1";
    write_file(dir.path(), decomposed, "DICM P1");
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    fs::rename(dir.path().join(decomposed), dir.path().join(composed)).unwrap();
    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.calls(), 0);
    let index = catalog.get(dir.path()).unwrap();
    assert_eq!(index.len(), 1);
    assert!(index.get(composed).is_some());
}

#[test]
fn test_real_rename_is_delete_and_add() {
    let dir = series();
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    fs::rename(dir.path().join("IM0002"), dir.path().join("IM0009")).unwrap();
    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.seen(), vec!["IM0009"]);
    assert_eq!(catalog.stats.records.deleted_dicom, 1);
    assert_eq!(catalog.stats.records.added_dicom, 1);
}

#[cfg(target_os = "linux")]
#[test]
fn test_two_spellings_on_case_sensitive_filesystem() {
    let dir = series();
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    write_file(dir.path(), "im0001", "DICM P1");
    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    // the exact spelling keeps the cached record, the other one is new
    assert_eq!(extractor.seen(), vec!["im0001"]);
    assert_eq!(catalog.stats.records.added_dicom, 1);
    let index = catalog.get(dir.path()).unwrap();
    assert_eq!(index.len(), 3);
    assert_eq!(
        index.get("IM0001").unwrap().provenance(),
        Provenance::Cached
    );

    // both spellings verify afterwards
    assert!(indexer(CatalogConfig::default(), &extractor)
        .verify(dir.path())
        .is_ok());
}
