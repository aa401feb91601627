//! Persisted pass-level state: options, export time, and the per-conversation
//! high-water marks that make reruns incremental.
//!
//! The context lives in a hidden state folder inside the output directory and
//! is rewritten atomically (temp file + rename) at the end of a pass. A
//! missing, corrupt, or version-mismatched file simply means "no prior
//! export": incremental state is a performance optimization, never a
//! correctness requirement, so it degrades to a fresh start instead of an
//! error.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bincode::config;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::options::ExportOptions;

/// Hidden state folder inside the output directory.
pub const STATE_DIR: &str = ".mce";
const CONTEXT_FILE: &str = "export.dat";

/// Schema version for invalidation on format changes.
const CONTEXT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportContext {
    version: u32,
    options: ExportOptions,
    last_export_unix: i64,
    /// conversation id → largest record id already exported. Monotonically
    /// non-decreasing across runs.
    max_record_ids: HashMap<String, i64>,
}

impl ExportContext {
    pub fn new(options: ExportOptions) -> Self {
        Self {
            version: CONTEXT_VERSION,
            options,
            last_export_unix: 0,
            max_record_ids: HashMap::new(),
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// High-water mark for a conversation; 0 when it was never exported.
    pub fn max_id(&self, conversation_id: &str) -> i64 {
        self.max_record_ids.get(conversation_id).copied().unwrap_or(0)
    }

    /// Advance a conversation's high-water mark. Lower values are ignored so
    /// the mark only ever moves forward.
    pub fn set_max_id(&mut self, conversation_id: &str, id: i64) {
        let entry = self.max_record_ids.entry(conversation_id.to_string()).or_insert(0);
        if id > *entry {
            *entry = id;
        }
    }

    pub fn conversation_count(&self) -> usize {
        self.max_record_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.max_record_ids.is_empty()
    }

    pub fn refresh_export_time(&mut self) {
        self.last_export_unix = Utc::now().timestamp();
    }

    pub fn last_export_time(&self) -> Option<DateTime<Utc>> {
        if self.last_export_unix == 0 {
            return None;
        }
        DateTime::from_timestamp(self.last_export_unix, 0)
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, config::standard())
            .context("Failed to serialize export context")
    }

    /// Decode a previously serialized context. Empty, corrupt, or
    /// version-mismatched input yields `None`.
    pub fn deserialize(bytes: &[u8]) -> Option<Self> {
        let (context, _): (ExportContext, usize) =
            bincode::serde::decode_from_slice(bytes, config::standard()).ok()?;
        if context.version != CONTEXT_VERSION {
            return None;
        }
        Some(context)
    }

    pub fn context_path(output_dir: &Path) -> PathBuf {
        output_dir.join(STATE_DIR).join(CONTEXT_FILE)
    }

    /// Load the prior pass's context, if a usable one exists. A context that
    /// never finished a conversation is treated as absent.
    pub fn load(output_dir: &Path) -> Option<Self> {
        let bytes = fs::read(Self::context_path(output_dir)).ok()?;
        let context = Self::deserialize(&bytes)?;
        if context.is_empty() {
            return None;
        }
        Some(context)
    }

    /// Persist atomically under the hidden state folder.
    pub fn save(&self, output_dir: &Path) -> Result<()> {
        let path = Self::context_path(output_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let bytes = self.serialize()?;
        let temp = path.with_extension("dat.tmp");
        fs::write(&temp, bytes).context("Failed to write context temp file")?;
        fs::rename(&temp, &path).context("Failed to rename context temp file")?;
        Ok(())
    }

    /// Options and timestamp of the previous export in `output_dir`, if any.
    /// Used to offer "continue where you left off" before a pass starts.
    pub fn has_previous_export(output_dir: &Path) -> Option<(ExportOptions, DateTime<Utc>)> {
        let context = Self::load(output_dir)?;
        let time = context.last_export_time()?;
        Some((context.options, time))
    }
}
