use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Flag value marking a directory entry in the backup manifest.
pub const FLAG_DIRECTORY: u32 = 2;

/// One virtual file inside a loaded backup archive.
///
/// `file_id` is the content-addressed identifier derived from
/// `(domain, relative_path)`; it locates the real backing bytes on disk.
/// The catalog owning these records keeps at most one record per
/// `relative_path` and stays sorted by it, so prefix queries reduce to a
/// contiguous range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupFileRecord {
    pub file_id: String,
    pub relative_path: String,
    pub flags: u32,
    /// Unix seconds; 0 when the manifest carried no usable timestamp.
    pub modified_time: u32,
    /// Raw per-file property blob from the database encoding, if any.
    #[serde(default, skip)]
    pub metadata: Option<Vec<u8>>,
}

impl BackupFileRecord {
    pub fn is_dir(&self) -> bool {
        self.flags == FLAG_DIRECTORY
    }
}

/// Metadata for one candidate backup directory on the host.
///
/// Compared by `path`; never mutated after discovery.
#[derive(Debug, Clone, Default)]
pub struct BackupManifest {
    pub path: PathBuf,
    pub device_name: String,
    pub display_name: String,
    pub backup_time: String,
    pub tool_version: String,
    pub host_os_version: String,
    pub ios_version: String,
    pub encrypted: bool,
}

impl BackupManifest {
    /// A descriptor is usable only when the identifying fields are all present.
    pub fn is_valid(&self) -> bool {
        !self.device_name.is_empty()
            && !self.display_name.is_empty()
            && !self.backup_time.is_empty()
    }
}

impl PartialEq for BackupManifest {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for BackupManifest {}

impl fmt::Display for BackupManifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] ({})", self.display_name, self.backup_time, self.path.display())?;
        if !self.tool_version.is_empty() {
            write!(f, " Tool Version: {}", self.tool_version)?;
        } else if !self.host_os_version.is_empty() {
            write!(f, " Embedded tool on {}", self.host_os_version)?;
        }
        if self.encrypted {
            write!(f, " [encrypted]")?;
        }
        Ok(())
    }
}
