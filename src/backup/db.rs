//! Loader for the database-style manifest encoding.
//!
//! `Manifest.db` holds a `Files` table keyed by content id, with one row per
//! virtual file: `fileID, domain, relativePath, flags, file`. The `file`
//! column is a keyed-archive property list carrying per-file attributes; only
//! the last-modified timestamp is extracted here, the rest of the blob is
//! kept verbatim on the record.

use std::io::Cursor;
use std::path::Path;

use rusqlite::{Connection, OpenFlags, params};

use super::{BackupError, index::LoadFilter};
use crate::models::{BackupFileRecord, FLAG_DIRECTORY};

pub(super) fn load_records(
    manifest_path: &Path,
    domain: &str,
    only_files: bool,
    filter: Option<&LoadFilter>,
) -> Result<Vec<BackupFileRecord>, BackupError> {
    let conn = Connection::open_with_flags(manifest_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

    let mut stmt =
        conn.prepare("SELECT fileID, relativePath, flags, file FROM Files WHERE domain = ?1")?;
    let mut rows = stmt.query(params![domain])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let flags: u32 = row.get(2)?;
        if only_files && flags == FLAG_DIRECTORY {
            continue;
        }
        let relative_path: String = row.get(1)?;
        if let Some(filter) = filter {
            if !filter(&relative_path, flags) {
                continue;
            }
        }
        let metadata: Option<Vec<u8>> = row.get(3)?;
        let modified_time = metadata.as_deref().and_then(parse_modified_time).unwrap_or(0);
        records.push(BackupFileRecord {
            file_id: row.get(0)?,
            relative_path,
            flags,
            modified_time,
            metadata,
        });
    }

    Ok(records)
}

/// Pull the `LastModified` attribute out of a keyed-archive property blob.
/// Anything unexpected in the blob yields `None` rather than an error.
pub(super) fn parse_modified_time(blob: &[u8]) -> Option<u32> {
    let value = plist::Value::from_reader(Cursor::new(blob)).ok()?;
    let objects = value.as_dictionary()?.get("$objects")?.as_array()?;
    for object in objects {
        if let Some(dict) = object.as_dictionary() {
            if let Some(modified) =
                dict.get("LastModified").and_then(plist::Value::as_signed_integer)
            {
                return u32::try_from(modified).ok();
            }
        }
    }
    None
}
