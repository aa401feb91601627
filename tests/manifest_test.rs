//! Integration tests for backup discovery on a host path.
mod common;

use std::fs;

use common::{BackupDirBuilder, records};
use mobile_chat_exporter::backup::{discover_backups, parse_backup_directory};

#[test]
fn test_discover_skips_invalid_directories() {
    let root = tempfile::tempdir().unwrap();

    // One well-formed backup...
    let backup = BackupDirBuilder::new()
        .device_name("Main Phone")
        .with_account("u", "A")
        .with_conversation("u", "c", "C", records(&[(1, 1, "x")]))
        .build();
    let valid_dir = root.path().join("00008030-000C2D3E0A");
    copy_dir(backup.path(), &valid_dir);

    // ...next to an empty directory, a partial one (descriptor but no
    // manifest), and a stray file.
    fs::create_dir(root.path().join("empty")).unwrap();
    let partial = root.path().join("partial");
    fs::create_dir(&partial).unwrap();
    fs::copy(valid_dir.join("Info.plist"), partial.join("Info.plist")).unwrap();
    fs::write(root.path().join("stray.txt"), "not a backup").unwrap();

    let manifests = discover_backups(root.path());
    assert_eq!(manifests.len(), 1);

    let manifest = &manifests[0];
    assert_eq!(manifest.path, valid_dir);
    assert_eq!(manifest.device_name, "Main Phone");
    assert_eq!(manifest.display_name, "Main Phone");
    assert!(!manifest.backup_time.is_empty());
    assert_eq!(manifest.tool_version, "12.8.2");
    assert_eq!(manifest.ios_version, "14.2");
    assert!(!manifest.encrypted);
    assert!(manifest.is_valid());
}

#[test]
fn test_parse_missing_directory_fails() {
    let root = tempfile::tempdir().unwrap();
    assert!(parse_backup_directory(&root.path().join("nope")).is_err());
}

#[test]
fn test_discover_empty_root_is_empty() {
    let root = tempfile::tempdir().unwrap();
    assert!(discover_backups(root.path()).is_empty());
}

fn copy_dir(src: &std::path::Path, dest: &std::path::Path) {
    fs::create_dir_all(dest).unwrap();
    for entry in fs::read_dir(src).unwrap() {
        let entry = entry.unwrap();
        let target = dest.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}
