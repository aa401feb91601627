//! Data models for backup archives and chat accounts.
//!
//! This module defines the data structures used throughout the crate:
//!
//! - [`BackupFileRecord`] - One virtual file inside a device backup archive
//! - [`BackupManifest`] - Per-archive metadata discovered on a host path
//! - [`Account`] / [`Conversation`] - The chat accounts found in a backup,
//!   each account owning its conversations
//! - [`ChatRecord`] - A single message row from a per-conversation store
//!
//! Backup records are immutable after the index that owns them is loaded;
//! accounts and conversations are built once per export pass.

pub mod backup;
pub mod chat;

pub use backup::{BackupFileRecord, BackupManifest, FLAG_DIRECTORY};
pub use chat::{Account, ChatRecord, Conversation};
