use dicomcat::catalog::CatalogConfig;
use dicomcat::codec::{self, Layout, CATALOG_ID};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::support::{archive, indexer, CountingExtractor};

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn updated_archive() -> TempDir {
    let dir = TempDir::new().unwrap();
    archive(dir.path());
    indexer(CatalogConfig::default(), &CountingExtractor::new())
        .update(dir.path())
        .unwrap();
    dir
}

#[test]
fn test_hierarchical_document_shape() {
    let dir = updated_archive();
    let doc = read_json(&Layout::Hierarchical.path_in(&dir.path().join("P1/S1")));

    assert_eq!(doc["id"], CATALOG_ID);
    assert_eq!(doc["type"], "hierarchical");
    assert!(doc.get("file_list").is_none());

    // patient / study / series / stack / acquisition
    let entries = &doc["dicom_list"]["P1"]["1.2.3"]["1.2.3.4"][""][""];
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["filename"], "IM0001");
    assert_eq!(entries[0]["size"], 7);
    assert_eq!(entries[0]["time_write"], "2024-01-02T03:04:05Z");
    assert_eq!(entries[0]["tags"]["Patient ID"], "P1");
    assert_eq!(entries[0]["tags"]["Modality"], "CT");
    assert_eq!(entries[0]["tags"].as_object().unwrap().len(), 12);
    assert_eq!(
        entries[0]["image_type"],
        serde_json::json!(["image", "tomogram_slice", "ct_slice"])
    );
}

#[test]
fn test_non_dicom_entries_have_no_tags() {
    let dir = updated_archive();
    let doc = read_json(&Layout::Hierarchical.path_in(&dir.path().join("P1")));

    assert!(doc.get("dicom_list").is_none());
    let files = doc["file_list"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["filename"], "README");
    assert!(files[0].get("tags").is_none());
    assert!(files[0].get("image_type").is_none());
}

#[test]
fn test_plain_document_lists_everything() {
    let dir = updated_archive();
    let doc = read_json(&Layout::Plain.path_in(&dir.path().join("P1/S1")));

    assert_eq!(doc["type"], "plain");
    assert!(doc.get("dicom_list").is_none());
    let names: Vec<&str> = doc["file_list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["filename"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["IM0001", "IM0002"]);
}

#[test]
fn test_both_layouts_load_to_the_same_index() {
    let dir = updated_archive();
    let s1 = dir.path().join("P1/S1");
    let hierarchical = codec::load(&s1, Layout::Hierarchical).unwrap();
    let plain = codec::load(&s1, Layout::Plain).unwrap();
    assert_eq!(hierarchical, plain);
    assert_eq!(hierarchical.len(), 2);
}

#[test]
fn test_misfiled_entry_is_rejected() {
    let dir = updated_archive();
    let path = Layout::Hierarchical.path_in(&dir.path().join("P1/S1"));
    let text = fs::read_to_string(&path).unwrap().replace("\"P1\": {", "\"P7\": {");
    fs::write(&path, text).unwrap();

    let err = codec::load(&dir.path().join("P1/S1"), Layout::Hierarchical).unwrap_err();
    assert!(matches!(err, codec::CodecError::Invalid { .. }), "{}", err);
}

#[test]
fn test_no_temporary_files_left_behind() {
    let dir = updated_archive();
    for entry in fs::read_dir(dir.path().join("P1/S1")).unwrap() {
        let name = entry.unwrap().file_name();
        assert!(!name.to_string_lossy().ends_with(codec::TEMP_SUFFIX));
    }
}
