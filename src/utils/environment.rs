use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Default location where the host sync tool keeps device backups.
pub fn default_backup_root() -> Result<PathBuf> {
    let home = env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home)
        .join("Library")
        .join("Application Support")
        .join("MobileSync")
        .join("Backup"))
}
