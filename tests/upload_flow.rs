//! Upload, lookup and deletion of stored files through the "upload" bundle.

use crud_kit::files::{check_extension, delete_path, human_file_size};
use crud_kit::{ConfigStore, FileManager, Record, TransferError, UploadDescriptor};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const MAX_SIZE: u64 = 2 * 1024 * 1024;

struct Fixture {
    _dir: tempfile::TempDir,
    uploads: PathBuf,
    manager: FileManager,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("config");
    let uploads = dir.path().join("public").join("uploads");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("upload.json"),
        json!({
            "directory": format!("{}/", uploads.display()),
            "allowed_extensions": ["jpeg", "jpg", "png"],
            "max_size": MAX_SIZE
        })
        .to_string(),
    )
    .unwrap();
    let store = Arc::new(ConfigStore::new(config_dir));
    let manager = FileManager::new(store, dir.path().join("staging"));
    Fixture {
        _dir: dir,
        uploads,
        manager,
    }
}

fn allowed() -> Vec<String> {
    vec!["jpeg".into(), "jpg".into(), "png".into()]
}

#[test]
fn valid_upload_gets_distinct_name_with_extension() {
    let f = fixture();
    let file = f.manager.stage("Photo Classe.PNG", b"\x89PNG fake").unwrap();
    let stored = f
        .manager
        .upload(&file, &f.uploads, &allowed(), MAX_SIZE)
        .expect("upload accepted");

    assert_ne!(stored, "Photo Classe.PNG");
    assert!(stored.starts_with("PhotoClasse_"));
    assert!(stored.ends_with(".png"));
    assert!(f.uploads.join(&stored).is_file());
    assert!(!file.tmp_path.exists(), "source is moved, not copied");
    assert!(!f.manager.is_uploaded_file(&file.tmp_path));
}

#[test]
fn identical_uploads_get_different_names() {
    let f = fixture();
    let a = f.manager.stage("cv.jpg", b"same bytes").unwrap();
    let b = f.manager.stage("cv.jpg", b"same bytes").unwrap();
    let first = f.manager.upload(&a, &f.uploads, &allowed(), MAX_SIZE).unwrap();
    let second = f.manager.upload(&b, &f.uploads, &allowed(), MAX_SIZE).unwrap();
    assert_ne!(first, second);
}

#[test]
fn same_descriptor_cannot_be_uploaded_twice() {
    let f = fixture();
    let file = f.manager.stage("cv.jpg", b"bytes").unwrap();
    assert!(f.manager.upload(&file, &f.uploads, &allowed(), MAX_SIZE).is_some());
    assert!(f.manager.upload(&file, &f.uploads, &allowed(), MAX_SIZE).is_none());
}

#[test]
fn transfer_error_is_rejected() {
    let f = fixture();
    let file = UploadDescriptor::failed("cv.jpg", TransferError::NoFile);
    assert!(f.manager.upload(&file, &f.uploads, &allowed(), MAX_SIZE).is_none());
}

#[test]
fn oversized_and_empty_files_are_rejected() {
    let f = fixture();
    let big = f.manager.stage("big.jpg", &[0u8; 64]).unwrap();
    assert!(f.manager.upload(&big, &f.uploads, &allowed(), 63).is_none());
    assert!(big.tmp_path.exists(), "rejected upload leaves the staged file");

    let empty = f.manager.stage("empty.jpg", b"").unwrap();
    assert!(f.manager.upload(&empty, &f.uploads, &allowed(), MAX_SIZE).is_none());
}

#[test]
fn disallowed_extension_is_rejected() {
    let f = fixture();
    let file = f.manager.stage("shell.php", b"<?php").unwrap();
    assert!(f.manager.upload(&file, &f.uploads, &allowed(), MAX_SIZE).is_none());
    assert!(!f.uploads.exists());
}

#[test]
fn empty_allow_list_accepts_any_extension() {
    let f = fixture();
    let file = f.manager.stage("notes.txt", b"hello").unwrap();
    let stored = f.manager.upload(&file, &f.uploads, &[], MAX_SIZE).unwrap();
    assert!(stored.ends_with(".txt"));
}

#[test]
fn arbitrary_server_path_is_rejected() {
    let f = fixture();
    let outside = f.uploads.parent().unwrap().join("secret.png");
    fs::create_dir_all(outside.parent().unwrap()).unwrap();
    fs::write(&outside, b"not an upload").unwrap();

    let forged = UploadDescriptor::new(&outside, "secret.png", 13);
    assert!(f.manager.upload(&forged, &f.uploads, &allowed(), MAX_SIZE).is_none());
    assert!(outside.exists());

    let planted = f.manager.staging_dir().join("planted.png");
    fs::create_dir_all(f.manager.staging_dir()).unwrap();
    fs::write(&planted, b"planted").unwrap();
    let forged = UploadDescriptor::new(&planted, "planted.png", 7);
    assert!(f.manager.upload(&forged, &f.uploads, &allowed(), MAX_SIZE).is_none());
}

#[test]
fn configured_upload_and_helpers() {
    let f = fixture();
    let file = f.manager.stage("photo.jpeg", &[7u8; 2048]).unwrap();
    let stored = f.manager.upload_configured(&file).expect("upload accepted");

    let path = f.manager.uploaded_file_path(&stored).unwrap();
    assert_eq!(path, f.uploads.join(&stored));
    assert_eq!(
        f.manager.uploaded_file_url(&stored).unwrap(),
        format!("uploads/{}", stored)
    );
    assert_eq!(f.manager.uploaded_file_size(&stored), "2.00 KB");
    assert_eq!(f.manager.uploaded_file_size("missing.png"), "0 bytes");

    let mut record = Record::new();
    record.insert("nom".into(), json!(stored));
    assert!(f.manager.delete(&record, "nom"));
    assert!(!path.exists());
    assert!(!f.manager.delete(&record, "nom"));
    assert!(!f.manager.delete(&record, "other_field"));
    assert!(!f.manager.delete(&Record::new(), "nom"));
}

#[test]
fn helpers_degrade_without_upload_config() {
    let dir = tempfile::tempdir().unwrap();
    let manager = FileManager::new(Arc::new(ConfigStore::new(dir.path())), dir.path().join("staging"));
    assert_eq!(manager.uploaded_file_path("a.png"), None);
    assert_eq!(manager.uploaded_file_url("a.png"), None);
    assert_eq!(manager.uploaded_file_size("a.png"), "0 bytes");

    let file = manager.stage("a.png", b"png").unwrap();
    assert!(manager.upload_configured(&file).is_none());
    manager.discard(&file);
    assert!(!file.tmp_path.exists());

    let mut record = Record::new();
    record.insert("nom".into(), json!("a.png"));
    assert!(!manager.delete(&record, "nom"));
}

#[test]
fn missing_destination_is_created() {
    let f = fixture();
    let nested = f.uploads.join("2024").join("03");
    let file = f.manager.stage("scan.png", b"scan").unwrap();
    let stored = f.manager.upload(&file, &nested, &allowed(), MAX_SIZE).unwrap();
    assert!(nested.join(stored).is_file());
}

#[cfg(unix)]
#[test]
fn created_directory_mode_is_0755() {
    use std::os::unix::fs::PermissionsExt;
    let f = fixture();
    let file = f.manager.stage("scan.png", b"scan").unwrap();
    f.manager.upload(&file, &f.uploads, &allowed(), MAX_SIZE).unwrap();
    let mode = fs::metadata(&f.uploads).unwrap().permissions().mode() & 0o777;
    // umask may only remove bits
    assert_eq!(mode & !0o755, 0);
}

fn write_len(path: &Path, len: u64) {
    let file = fs::File::create(path).unwrap();
    file.set_len(len).unwrap();
}

#[test]
fn human_file_size_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let cases: [(u64, &str); 6] = [
        (0, "0 bytes"),
        (1, "1 byte"),
        (500, "500 bytes"),
        (1024, "1.00 KB"),
        (1_048_576, "1.00 MB"),
        (1_073_741_824, "1.00 GB"),
    ];
    for (len, expected) in cases {
        let path = dir.path().join(format!("f{}", len));
        write_len(&path, len);
        assert_eq!(human_file_size(&path), expected, "size {}", len);
    }
    assert_eq!(human_file_size(dir.path().join("absent")), "0 bytes");
}

#[test]
fn delete_path_reports_missing_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x.png");
    fs::write(&path, b"x").unwrap();
    assert!(delete_path(&path));
    assert!(!delete_path(&path));
}

#[test]
fn check_extension_uses_configured_list() {
    assert!(check_extension("IMG_001.JPEG", &allowed()));
    assert!(!check_extension("IMG_001.gif", &allowed()));
}
