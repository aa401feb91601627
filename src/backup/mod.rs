//! Backup archive access: manifest discovery and the virtual-file index.
//!
//! A device backup stores application files under content-addressed names,
//! described by a manifest in one of two physical encodings: a SQLite
//! database (`Manifest.db`) or a legacy length-prefixed binary stream
//! (`Manifest.mbdb`). [`BackupIndex`] hides the difference and answers
//! path-exact and path-prefix queries over a sorted in-memory catalog.
//!
//! # Error Handling Strategy
//!
//! The index layer uses a typed error enum so callers can tell an absent
//! manifest (often an expected condition) from a structurally broken one.
//! A domain with no entries is not an error; it loads as an empty catalog.
//! The legacy decoder tolerates truncated trailing records by stopping
//! cleanly at the last complete entry.

pub mod index;
pub mod manifest;

mod db;
mod mbdb;

use std::path::PathBuf;

use thiserror::Error;

pub use index::{BackupIndex, LoadFilter};
pub use manifest::{discover_backups, parse_backup_directory};

/// File name of the database-style manifest encoding.
pub const MANIFEST_DB: &str = "Manifest.db";
/// File name of the legacy binary manifest encoding.
pub const MANIFEST_MBDB: &str = "Manifest.mbdb";

#[derive(Debug, Error)]
pub enum BackupError {
    #[error("not found: {0}")]
    NotFound(PathBuf),
    #[error("malformed manifest: {0}")]
    Malformed(String),
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("backup database error: {0}")]
    Database(#[from] rusqlite::Error),
}
