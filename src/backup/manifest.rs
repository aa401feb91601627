//! Discovery of candidate backup directories on a host path.
//!
//! A backup root typically holds one subdirectory per device, mixed with
//! stale or half-written entries left behind by sync tools. Discovery
//! silently skips anything that does not parse into a valid descriptor.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use walkdir::WalkDir;

use super::{BackupError, MANIFEST_DB, MANIFEST_MBDB};
use crate::models::BackupManifest;

const INFO_PLIST: &str = "Info.plist";
const MANIFEST_PLIST: &str = "Manifest.plist";

/// Scan `root` for backup directories, one descriptor per well-formed entry,
/// newest backup first. Invalid or partial directories are skipped, not
/// surfaced as errors.
pub fn discover_backups(root: &Path) -> Vec<BackupManifest> {
    let candidates: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .collect();

    let mut manifests: Vec<BackupManifest> = candidates
        .par_iter()
        .filter_map(|dir| parse_backup_directory(dir).ok())
        .filter(BackupManifest::is_valid)
        .collect();

    manifests.sort_by(|a, b| b.backup_time.cmp(&a.backup_time));
    manifests
}

/// Parse one backup directory's descriptor files.
///
/// Requires `Info.plist` plus one of the two manifest encodings on disk;
/// the encryption flag comes from `Manifest.plist` when present.
pub fn parse_backup_directory(dir: &Path) -> Result<BackupManifest, BackupError> {
    if !dir.join(MANIFEST_DB).is_file() && !dir.join(MANIFEST_MBDB).is_file() {
        return Err(BackupError::NotFound(dir.join(MANIFEST_DB)));
    }

    let info_path = dir.join(INFO_PLIST);
    if !info_path.is_file() {
        return Err(BackupError::NotFound(info_path));
    }
    let info = plist::Value::from_file(&info_path)
        .map_err(|e| BackupError::Malformed(format!("{}: {}", info_path.display(), e)))?;
    let info = info.as_dictionary().ok_or_else(|| {
        BackupError::Malformed(format!("{}: not a dictionary", info_path.display()))
    })?;

    let mut manifest = BackupManifest {
        path: dir.to_path_buf(),
        device_name: string_value(info, "Device Name"),
        display_name: string_value(info, "Display Name"),
        backup_time: date_value(info, "Last Backup Date"),
        tool_version: string_value(info, "iTunes Version"),
        host_os_version: string_value(info, "macOS Version"),
        ios_version: string_value(info, "Product Version"),
        encrypted: false,
    };

    // Manifest.plist is absent from very old backups; treat that as "not
    // encrypted" rather than invalid.
    if let Ok(extra) = plist::Value::from_file(dir.join(MANIFEST_PLIST)) {
        if let Some(dict) = extra.as_dictionary() {
            manifest.encrypted =
                dict.get("IsEncrypted").and_then(plist::Value::as_boolean).unwrap_or(false);
            if manifest.tool_version.is_empty() {
                manifest.tool_version = string_value(dict, "Version");
            }
        }
    }

    Ok(manifest)
}

fn string_value(dict: &plist::Dictionary, key: &str) -> String {
    dict.get(key).and_then(plist::Value::as_string).unwrap_or_default().to_string()
}

fn date_value(dict: &plist::Dictionary, key: &str) -> String {
    let Some(date) = dict.get(key).and_then(plist::Value::as_date) else {
        return String::new();
    };
    let system_time: SystemTime = date.into();
    let timestamp: DateTime<Utc> = system_time.into();
    timestamp.format("%Y-%m-%d %H:%M:%S").to_string()
}
