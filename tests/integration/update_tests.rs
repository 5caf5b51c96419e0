use dicomcat::catalog::{CatalogConfig, CatalogError};
use dicomcat::codec::{Layout, WriteMode};
use dicomcat::index::{DicomState, DicomTag};
use std::fs;
use tempfile::TempDir;

use crate::support::{archive, indexer, write_file, write_file_at, CountingExtractor, MTIME};

#[test]
fn test_first_update_indexes_every_directory() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();

    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    let stats = &catalog.stats;
    assert_eq!(stats.directories_visited, 4);
    assert_eq!(stats.directories_indexed, 3);
    assert_eq!(stats.index_files_created, 6);
    assert_eq!(stats.records.added_dicom, 3);
    assert_eq!(stats.records.added_non_dicom, 1);
    assert!(!stats.has_failures());
    assert_eq!(extractor.calls(), 4);
    assert_eq!(catalog.file_count(), 4);
    assert_eq!(catalog.dicom_count(), 3);

    for sub in ["P1", "P1/S1", "P1/S2"] {
        for layout in Layout::ALL {
            assert!(layout.path_in(&dir.path().join(sub)).is_file(), "{} {:?}", sub, layout);
        }
    }
    // only a denied file at the root
    assert!(!Layout::Hierarchical.path_in(dir.path()).exists());
    assert!(!Layout::Plain.path_in(dir.path()).exists());
}

#[test]
fn test_records_carry_extracted_metadata() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    let series = catalog.get(&dir.path().join("P1/S1")).unwrap();
    let record = series.get("IM0001").unwrap();
    assert!(record.is_dicom());
    assert_eq!(record.file_size(), 7);
    assert_eq!(record.modified(), "2024-01-02T03:04:05Z");
    assert_eq!(record.tags().unwrap().get(DicomTag::PatientId), "P1");

    let patient = catalog.get(&dir.path().join("P1")).unwrap();
    assert_eq!(patient.get("README").unwrap().dicom_state(), DicomState::NotDicom);
}

#[test]
fn test_second_update_reads_nothing() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();
    let before = fs::read(Layout::Plain.path_in(&dir.path().join("P1/S1"))).unwrap();

    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.calls(), 0);
    assert_eq!(catalog.stats.records.total_changes(), 0);
    assert_eq!(catalog.stats.index_files_created, 0);
    assert_eq!(catalog.stats.index_files_modified, 0);
    assert_eq!(catalog.file_count(), 4);
    let after = fs::read(Layout::Plain.path_in(&dir.path().join("P1/S1"))).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_changed_file_is_reread() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    write_file_at(dir.path(), "P1/S1/IM0002", "DICM P2", MTIME + 60);
    write_file_at(dir.path(), "P1/S2/IM0001", "DICM P1", MTIME + 60);
    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.seen(), vec!["IM0001", "IM0002"]);
    assert_eq!(catalog.stats.records.modified_dicom, 2);
    assert_eq!(catalog.stats.index_files_modified, 4);
    let series = catalog.get(&dir.path().join("P1/S1")).unwrap();
    assert_eq!(
        series.get("IM0002").unwrap().tags().unwrap().get(DicomTag::PatientId),
        "P2"
    );
}

#[test]
fn test_new_and_deleted_files() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    fs::remove_file(dir.path().join("P1/S1/IM0001")).unwrap();
    write_file(dir.path(), "P1/S1/IM0003", "DICM P1");
    write_file(dir.path(), "P1/S1/scout.dcm", "plain bytes");
    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.seen(), vec!["IM0003", "scout.dcm"]);
    let r = &catalog.stats.records;
    assert_eq!(r.deleted_dicom, 1);
    assert_eq!(r.added_dicom, 1);
    assert_eq!(r.added_non_dicom, 1);
    let series = catalog.get(&dir.path().join("P1/S1")).unwrap();
    let names: Vec<&str> = series.records().iter().map(|r| r.file_name()).collect();
    assert_eq!(names, vec!["IM0002", "IM0003", "scout.dcm"]);
}

#[test]
fn test_emptied_directory_loses_its_index_files() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    fs::remove_file(dir.path().join("P1/S2/IM0001")).unwrap();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    let s2 = dir.path().join("P1/S2");
    assert!(!Layout::Hierarchical.path_in(&s2).exists());
    assert!(!Layout::Plain.path_in(&s2).exists());
    assert_eq!(catalog.stats.index_files_deleted, 2);
    assert_eq!(catalog.stats.records.deleted_dicom, 1);
    assert!(catalog.get(&s2).is_none());
    assert_eq!(catalog.stats.directories_indexed, 2);
}

#[test]
fn test_reserved_and_temporary_files_are_not_indexed() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();
    write_file(dir.path(), "P1/S1/dicom_catalog.json.tmp", "{");

    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.calls(), 0);
    let series = catalog.get(&dir.path().join("P1/S1")).unwrap();
    assert_eq!(series.len(), 2);
    assert!(series.get(Layout::Hierarchical.file_name()).is_none());
    assert!(series.get(Layout::Plain.file_name()).is_none());
    assert!(series.get("dicom_catalog.json.tmp").is_none());
}

#[test]
fn test_extra_denied_extension() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "IM0001", "DICM P1");
    write_file(dir.path(), "IM0001.raw", "DICM P1");
    let extractor = CountingExtractor::new();

    let config = CatalogConfig::default().with_filter(
        dicomcat::scanner::NameFilter::default().with_extra(Vec::<String>::new(), ["raw"]),
    );
    let catalog = indexer(config, &extractor).update(dir.path()).unwrap();

    assert_eq!(extractor.seen(), vec!["IM0001"]);
    assert_eq!(catalog.file_count(), 1);
}

#[test]
fn test_write_mode_migration() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    let s1 = dir.path().join("P1/S1");

    indexer(
        CatalogConfig::default().with_write_mode(WriteMode::Plain),
        &extractor,
    )
    .update(dir.path())
    .unwrap();
    assert!(Layout::Plain.path_in(&s1).is_file());
    assert!(!Layout::Hierarchical.path_in(&s1).exists());

    extractor.reset();
    let catalog = indexer(
        CatalogConfig::default().with_write_mode(WriteMode::Hierarchical),
        &extractor,
    )
    .update(dir.path())
    .unwrap();

    assert_eq!(extractor.calls(), 0);
    assert!(!Layout::Plain.path_in(&s1).exists());
    assert!(Layout::Hierarchical.path_in(&s1).is_file());
    assert_eq!(catalog.stats.index_files_created, 3);
    assert_eq!(catalog.stats.index_files_deleted, 3);
}

#[test]
fn test_missing_layout_is_written_without_changes() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();
    let s2 = dir.path().join("P1/S2");
    fs::remove_file(Layout::Hierarchical.path_in(&s2)).unwrap();

    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert!(Layout::Hierarchical.path_in(&s2).is_file());
    assert_eq!(catalog.stats.index_files_created, 1);
    assert_eq!(catalog.stats.index_files_modified, 0);
}

#[test]
fn test_unreadable_index_falls_back_to_other_layout() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();
    let s1 = dir.path().join("P1/S1");
    fs::write(Layout::Hierarchical.path_in(&s1), "{ truncated").unwrap();

    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.calls(), 0);
    assert_eq!(catalog.stats.index_files_modified, 1);
    assert!(dicomcat::codec::load(&s1, Layout::Hierarchical).is_ok());
}

#[test]
fn test_unreadable_plain_layout_is_rewritten() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();
    let s1 = dir.path().join("P1/S1");
    fs::write(Layout::Plain.path_in(&s1), "{ truncated").unwrap();

    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.calls(), 0);
    assert_eq!(catalog.stats.index_files_modified, 1);
    assert_eq!(catalog.stats.index_files_created, 0);
    let plain = dicomcat::codec::load(&s1, Layout::Plain).unwrap();
    assert_eq!(&plain, catalog.get(&s1).unwrap());
}

#[test]
fn test_write_failure_is_counted_and_retried() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "IM001", "DICM P7");
    let hierarchical = Layout::Hierarchical.path_in(dir.path());
    let blocker = dir.path().join("dicom_catalog.json.tmp");
    fs::create_dir(&blocker).unwrap();
    let extractor = CountingExtractor::new();

    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(catalog.stats.write_failures, 1);
    assert_eq!(catalog.stats.failed_directories, 0);
    assert_eq!(catalog.get(dir.path()).unwrap().len(), 1);
    assert!(!hierarchical.exists());
    assert!(Layout::Plain.path_in(dir.path()).is_file());

    fs::remove_dir(&blocker).unwrap();
    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.calls(), 0);
    assert_eq!(catalog.stats.write_failures, 0);
    assert_eq!(catalog.stats.index_files_created, 1);
    assert!(dicomcat::codec::load(dir.path(), Layout::Hierarchical).is_ok());
}

#[test]
fn test_all_layouts_unreadable_rebuilds_directory() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();
    let s1 = dir.path().join("P1/S1");
    fs::write(Layout::Hierarchical.path_in(&s1), "[]").unwrap();
    fs::write(Layout::Plain.path_in(&s1), "not json").unwrap();

    extractor.reset();
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.seen(), vec!["IM0001", "IM0002"]);
    assert_eq!(catalog.stats.records.added_dicom, 2);
    assert_eq!(catalog.stats.index_files_modified, 2);
    assert!(!catalog.stats.has_failures());
}

#[test]
fn test_force_rereads_everything() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    extractor.reset();
    let catalog = indexer(CatalogConfig::default().with_force(true), &extractor)
        .update(dir.path())
        .unwrap();

    assert_eq!(extractor.calls(), 4);
    assert_eq!(catalog.stats.records.modified_dicom, 3);
    assert_eq!(catalog.stats.records.modified_non_dicom, 1);
}

#[test]
fn test_new_corrupt_file_is_indexed_as_not_dicom() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "IM0001", "CORRUPT");
    let extractor = CountingExtractor::new();

    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    let index = catalog.get(dir.path()).unwrap();
    assert_eq!(index.get("IM0001").unwrap().dicom_state(), DicomState::NotDicom);
    assert_eq!(catalog.stats.records.added_non_dicom, 1);
    assert!(!catalog.stats.has_failures());
}

#[test]
fn test_known_dicom_turning_corrupt_fails_directory() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();
    let s1 = dir.path().join("P1/S1");
    let before = fs::read(Layout::Plain.path_in(&s1)).unwrap();

    write_file_at(dir.path(), "P1/S1/IM0002", "CORRUPT", MTIME + 60);
    write_file(dir.path(), "P1/S2/IM0002", "DICM P1");
    let catalog = indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();

    assert!(catalog.stats.has_failures());
    assert_eq!(catalog.stats.failed_directories, 1);
    assert_eq!(catalog.stats.failures[0].path, s1);
    assert!(catalog.get(&s1).is_none());
    // other directories still processed
    assert_eq!(catalog.get(&dir.path().join("P1/S2")).unwrap().len(), 2);
    assert_eq!(fs::read(Layout::Plain.path_in(&s1)).unwrap(), before);
}

#[test]
fn test_fail_fast_returns_directory_error() {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    let extractor = CountingExtractor::new();
    indexer(CatalogConfig::default(), &extractor)
        .update(dir.path())
        .unwrap();
    write_file_at(dir.path(), "P1/S1/IM0002", "CORRUPT", MTIME + 60);

    let result = indexer(CatalogConfig::default().with_fail_fast(true), &extractor)
        .update(dir.path());

    match result {
        Err(CatalogError::Index(e)) => {
            assert!(e.to_string().contains("S1"));
        }
        other => panic!("Expected index error, got {:?}", other.map(|c| c.stats)),
    }
}

#[test]
fn test_single_thread_matches_parallel() {
    let a = TempDir::new().unwrap();
    let b = TempDir::new().unwrap();
    for dir in [&a, &b] {
        archive(dir.path());
        for i in 0..20 {
            write_file(dir.path(), &format!("P2/S{}/IM{:04}", i % 4, i), "DICM P2");
        }
    }
    let extractor = CountingExtractor::new();

    let serial = indexer(CatalogConfig::default().with_io_threads(1), &extractor)
        .update(a.path())
        .unwrap();
    let parallel = indexer(CatalogConfig::default().with_io_threads(8), &extractor)
        .update(b.path())
        .unwrap();

    assert_eq!(serial.stats.records, parallel.stats.records);
    assert_eq!(serial.stats.directories_visited, parallel.stats.directories_visited);
    for layout in Layout::ALL {
        for i in 0..4 {
            let sub = format!("P2/S{}", i);
            assert_eq!(
                fs::read(layout.path_in(&a.path().join(&sub))).unwrap(),
                fs::read(layout.path_in(&b.path().join(&sub))).unwrap()
            );
        }
    }
}
