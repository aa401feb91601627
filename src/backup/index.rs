//! In-memory catalog of one archive domain's virtual files.

use std::fs;
use std::path::{Path, PathBuf};

use super::{BackupError, MANIFEST_DB, MANIFEST_MBDB, db, mbdb};
use crate::models::BackupFileRecord;

/// Predicate applied to `(relative_path, flags)` while the manifest is being
/// decoded; rejected records are dropped before they reach the catalog, which
/// bounds memory on large archives.
pub type LoadFilter = dyn Fn(&str, u32) -> bool;

/// Path-sorted catalog of the virtual files in one backup domain.
///
/// Built once by [`BackupIndex::load`], read-only afterwards. The physical
/// manifest encoding (database or legacy binary stream) is detected on load
/// and never visible to callers, except through the on-disk layout used by
/// [`BackupIndex::resolve_real_path`].
pub struct BackupIndex {
    backup_dir: PathBuf,
    records: Vec<BackupFileRecord>,
    /// Legacy backups store content files directly under the backup root;
    /// database-era backups fan out into 256 two-hex-digit subdirectories.
    flat_layout: bool,
}

impl BackupIndex {
    pub fn new(backup_dir: impl Into<PathBuf>) -> Self {
        Self { backup_dir: backup_dir.into(), records: Vec::new(), flat_layout: false }
    }

    /// Load the catalog for `domain`, replacing any previous contents.
    ///
    /// A domain absent from the manifest is not an error: a companion or
    /// shared domain may legitimately not exist, and the catalog simply loads
    /// empty. A missing manifest file is [`BackupError::NotFound`].
    pub fn load(
        &mut self,
        domain: &str,
        only_files: bool,
        filter: Option<&LoadFilter>,
    ) -> Result<(), BackupError> {
        let db_path = self.backup_dir.join(MANIFEST_DB);
        let mbdb_path = self.backup_dir.join(MANIFEST_MBDB);

        let mut records = if db_path.is_file() {
            self.flat_layout = false;
            db::load_records(&db_path, domain, only_files, filter)?
        } else if mbdb_path.is_file() {
            self.flat_layout = true;
            let data = fs::read(&mbdb_path)?;
            mbdb::load_records(&data, domain, only_files, filter)?
        } else {
            return Err(BackupError::NotFound(db_path));
        };

        records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        records.dedup_by(|a, b| a.relative_path == b.relative_path);
        self.records = records;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[BackupFileRecord] {
        &self.records
    }

    /// Exact-path lookup via binary search over the sorted catalog.
    pub fn find_exact(&self, relative_path: &str) -> Option<&BackupFileRecord> {
        self.records
            .binary_search_by(|r| r.relative_path.as_str().cmp(relative_path))
            .ok()
            .map(|idx| &self.records[idx])
    }

    /// All records whose path starts with `prefix`, in sorted order.
    ///
    /// Because the catalog is sorted, the matching records form one
    /// contiguous subrange; both bounds are found by binary search, so the
    /// cost is proportional to the match, not the catalog.
    pub fn find_range(&self, prefix: &str) -> &[BackupFileRecord] {
        let start = self.records.partition_point(|r| r.relative_path.as_str() < prefix);
        let tail = &self.records[start..];
        let len = tail.partition_point(|r| r.relative_path.starts_with(prefix));
        &tail[..len]
    }

    /// Predicate scan for callers that have no usable path prefix.
    pub fn filter_records<P>(&self, predicate: P) -> Vec<&BackupFileRecord>
    where
        P: Fn(&BackupFileRecord) -> bool,
    {
        self.records.iter().filter(|r| predicate(r)).collect()
    }

    /// Where the record's backing bytes live on the local filesystem.
    ///
    /// Pure function of the content id and the manifest encoding's layout;
    /// no I/O happens here, existence is only checked by callers that need it.
    pub fn resolve_real_path(&self, record: &BackupFileRecord) -> PathBuf {
        if self.flat_layout || record.file_id.len() < 2 {
            self.backup_dir.join(&record.file_id)
        } else {
            self.backup_dir.join(&record.file_id[..2]).join(&record.file_id)
        }
    }

    pub fn find_real_path(&self, relative_path: &str) -> Option<PathBuf> {
        self.find_exact(relative_path).map(|r| self.resolve_real_path(r))
    }

    /// Copy a virtual file's bytes to `dest`. Returns `false` when `dest`
    /// already exists and `overwrite` is not set.
    pub fn copy_out(
        &self,
        relative_path: &str,
        dest: &Path,
        overwrite: bool,
    ) -> Result<bool, BackupError> {
        let record = self
            .find_exact(relative_path)
            .ok_or_else(|| BackupError::NotFound(PathBuf::from(relative_path)))?;
        let real_path = self.resolve_real_path(record);
        if !real_path.is_file() {
            return Err(BackupError::NotFound(real_path));
        }
        if dest.exists() && !overwrite {
            return Ok(false);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&real_path, dest)?;
        Ok(true)
    }
}
