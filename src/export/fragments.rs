//! Binary-framed fragment logs.
//!
//! One log per conversation holds the opaque rendered fragments of every
//! record exported so far, in the order they were produced:
//!
//! ```text
//! count: u32 big-endian
//! count × ( length: u32 big-endian, length raw bytes )
//! ```
//!
//! Reading is defensive: a missing file, a header too short to hold the
//! count, or a length running past end-of-file all degrade to "no prior
//! fragments" (or the longest fully-readable prefix), never an error.
//! Writing always rewrites the whole file atomically; accumulation happens
//! by merging in memory first.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::context::STATE_DIR;
use super::options::PageOrder;

/// Where a conversation's fragment log lives inside the output directory.
pub fn fragment_log_path(output_dir: &Path, user_id: &str, conversation_id: &str) -> PathBuf {
    output_dir.join(STATE_DIR).join(user_id).join(format!("{conversation_id}.dat"))
}

/// Read every fully-framed fragment; truncation yields a prefix, not an error.
pub fn read_fragments(path: &Path) -> Vec<Vec<u8>> {
    let Ok(data) = fs::read(path) else {
        return Vec::new();
    };
    if data.len() < 4 {
        return Vec::new();
    }

    let count = u32::from_be_bytes(data[0..4].try_into().unwrap()) as usize;
    let mut fragments = Vec::with_capacity(count.min(1024));
    let mut offset = 4usize;

    for _ in 0..count {
        let Some(header_end) = offset.checked_add(4) else { break };
        if header_end > data.len() {
            break;
        }
        let length = u32::from_be_bytes(data[offset..header_end].try_into().unwrap()) as usize;
        let Some(end) = header_end.checked_add(length) else { break };
        if end > data.len() {
            break;
        }
        fragments.push(data[header_end..end].to_vec());
        offset = end;
    }

    fragments
}

/// Truncate and rewrite the whole log. The count prefix always equals the
/// number of entries that follow.
pub fn write_fragments(path: &Path, fragments: &[Vec<u8>]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let total: usize = fragments.iter().map(|f| f.len() + 4).sum();
    let mut data = Vec::with_capacity(4 + total);
    data.extend_from_slice(&(fragments.len() as u32).to_be_bytes());
    for fragment in fragments {
        data.extend_from_slice(&(fragment.len() as u32).to_be_bytes());
        data.extend_from_slice(fragment);
    }

    let temp = path.with_extension("dat.tmp");
    fs::write(&temp, data)
        .with_context(|| format!("Failed to write fragment log {}", temp.display()))?;
    fs::rename(&temp, path)
        .with_context(|| format!("Failed to rename fragment log {}", path.display()))?;
    Ok(())
}

/// Combine the previous run's fragments with this run's.
///
/// Per-run fragments are produced in ascending record order, so for
/// ascending display the old fragments go first; for descending display the
/// new fragments lead and the old ones follow unchanged.
pub fn merge_fragments(
    old: Vec<Vec<u8>>,
    new: Vec<Vec<u8>>,
    order: PageOrder,
) -> Vec<Vec<u8>> {
    let (mut head, tail) = match order {
        PageOrder::Ascending => (old, new),
        PageOrder::Descending => (new, old),
    };
    head.reserve(tail.len());
    head.extend(tail);
    head
}
