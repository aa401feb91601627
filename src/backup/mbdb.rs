//! Loader for the legacy length-prefixed manifest encoding.
//!
//! `Manifest.mbdb` is a flat record stream: a 6-byte header followed by one
//! variable-length record per virtual file. Strings are u16 big-endian
//! length-prefixed, with `0xFFFF` marking an absent value. The content id is
//! not stored; it is the SHA-1 digest of `"<domain>-<relative_path>"`.
//!
//! Records written by interrupted tools are routinely truncated at the tail,
//! so the decoder stops at the last complete record instead of failing.

use sha1::{Digest, Sha1};

use super::{BackupError, index::LoadFilter};
use crate::models::BackupFileRecord;

const MBDB_MAGIC: &[u8; 6] = b"mbdb\x05\x00";

const MODE_KIND_MASK: u16 = 0xF000;
const MODE_DIRECTORY: u16 = 0x4000;

pub(super) fn load_records(
    data: &[u8],
    domain: &str,
    only_files: bool,
    filter: Option<&LoadFilter>,
) -> Result<Vec<BackupFileRecord>, BackupError> {
    if data.len() < MBDB_MAGIC.len() || &data[..MBDB_MAGIC.len()] != MBDB_MAGIC {
        return Err(BackupError::Malformed("bad mbdb header".to_string()));
    }

    let mut reader = Reader { data, pos: MBDB_MAGIC.len() };
    let mut records = Vec::new();

    while !reader.at_end() {
        let Some(entry) = read_entry(&mut reader) else {
            // Truncated trailing record: keep what decoded cleanly.
            break;
        };
        if entry.domain != domain {
            continue;
        }
        let flags = if entry.mode & MODE_KIND_MASK == MODE_DIRECTORY { 2 } else { 1 };
        if only_files && flags == 2 {
            continue;
        }
        if let Some(filter) = filter {
            if !filter(&entry.relative_path, flags) {
                continue;
            }
        }
        records.push(BackupFileRecord {
            file_id: file_id_for(&entry.domain, &entry.relative_path),
            relative_path: entry.relative_path,
            flags,
            modified_time: entry.modified_time,
            metadata: None,
        });
    }

    Ok(records)
}

/// Content id used by the flat on-disk layout of legacy backups.
pub(super) fn file_id_for(domain: &str, relative_path: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(domain.as_bytes());
    hasher.update(b"-");
    hasher.update(relative_path.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

struct Entry {
    domain: String,
    relative_path: String,
    mode: u16,
    modified_time: u32,
}

fn read_entry(reader: &mut Reader<'_>) -> Option<Entry> {
    let domain = reader.read_string()?;
    let relative_path = reader.read_string()?;
    let _link_target = reader.read_string()?;
    let _data_hash = reader.read_string()?;
    let _encryption_key = reader.read_string()?;
    let mode = reader.read_u16()?;
    let _inode = reader.read_u64()?;
    let _user_id = reader.read_u32()?;
    let _group_id = reader.read_u32()?;
    let modified_time = reader.read_u32()?;
    let _accessed_time = reader.read_u32()?;
    let _created_time = reader.read_u32()?;
    let _length = reader.read_u64()?;
    let _protection_class = reader.read_u8()?;
    let property_count = reader.read_u8()?;
    for _ in 0..property_count {
        reader.read_string()?;
        reader.read_string()?;
    }

    Some(Entry { domain, relative_path, mode, modified_time })
}

/// Bounds-checked big-endian cursor; every read returns `None` past EOF.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(len)?;
        if end > self.data.len() {
            return None;
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Some(slice)
    }

    fn read_u8(&mut self) -> Option<u8> {
        self.take(1).map(|s| s[0])
    }

    fn read_u16(&mut self) -> Option<u16> {
        self.take(2).map(|s| u16::from_be_bytes(s.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Option<u32> {
        self.take(4).map(|s| u32::from_be_bytes(s.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Option<u64> {
        self.take(8).map(|s| u64::from_be_bytes(s.try_into().unwrap()))
    }

    /// `0xFFFF` length means "no value"; decoded as an empty string.
    fn read_string(&mut self) -> Option<String> {
        let len = self.read_u16()?;
        if len == 0xFFFF {
            return Some(String::new());
        }
        let bytes = self.take(len as usize)?;
        Some(String::from_utf8_lossy(bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_string(buf: &mut Vec<u8>, value: Option<&str>) {
        match value {
            Some(s) => {
                buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
                buf.extend_from_slice(s.as_bytes());
            }
            None => buf.extend_from_slice(&0xFFFFu16.to_be_bytes()),
        }
    }

    fn push_entry(buf: &mut Vec<u8>, domain: &str, path: &str, mode: u16, mtime: u32) {
        push_string(buf, Some(domain));
        push_string(buf, Some(path));
        push_string(buf, None); // link target
        push_string(buf, None); // data hash
        push_string(buf, None); // encryption key
        buf.extend_from_slice(&mode.to_be_bytes());
        buf.extend_from_slice(&0u64.to_be_bytes()); // inode
        buf.extend_from_slice(&501u32.to_be_bytes()); // uid
        buf.extend_from_slice(&501u32.to_be_bytes()); // gid
        buf.extend_from_slice(&mtime.to_be_bytes());
        buf.extend_from_slice(&mtime.to_be_bytes()); // atime
        buf.extend_from_slice(&mtime.to_be_bytes()); // ctime
        buf.extend_from_slice(&0u64.to_be_bytes()); // length
        buf.push(0); // protection class
        buf.push(0); // property count
    }

    fn sample(domain: &str) -> Vec<u8> {
        let mut buf = MBDB_MAGIC.to_vec();
        push_entry(&mut buf, domain, "Documents", 0x41ED, 100);
        push_entry(&mut buf, domain, "Documents/a.txt", 0x81A4, 200);
        push_entry(&mut buf, "OtherDomain", "b.txt", 0x81A4, 300);
        buf
    }

    #[test]
    fn test_decodes_records_for_requested_domain() {
        let data = sample("AppDomain-com.example.messenger");
        let records =
            load_records(&data, "AppDomain-com.example.messenger", false, None).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].is_dir());
        assert_eq!(records[1].relative_path, "Documents/a.txt");
        assert_eq!(records[1].modified_time, 200);
        assert_eq!(records[1].file_id.len(), 40);
    }

    #[test]
    fn test_only_files_drops_directories() {
        let data = sample("D");
        let records = load_records(&data, "D", true, None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].relative_path, "Documents/a.txt");
    }

    #[test]
    fn test_load_filter_applies_during_decode() {
        let data = sample("D");
        let filter: &LoadFilter = &|path, _flags| path.ends_with(".txt");
        let records = load_records(&data, "D", false, Some(filter)).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_truncated_trailing_record_is_dropped() {
        let mut data = sample("D");
        push_string(&mut data, Some("D"));
        push_string(&mut data, Some("Documents/cut-off"));
        // Record ends mid-field; decoder must stop at the last complete entry.
        let records = load_records(&data, "D", false, None).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_bad_header_is_malformed() {
        let err = load_records(b"not-mbdb", "D", false, None).unwrap_err();
        assert!(matches!(err, BackupError::Malformed(_)));
    }

    #[test]
    fn test_file_id_is_stable() {
        assert_eq!(file_id_for("D", "a"), file_id_for("D", "a"));
        assert_ne!(file_id_for("D", "a"), file_id_for("D", "b"));
    }
}
