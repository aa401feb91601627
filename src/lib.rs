//! Mobile Chat Exporter - Export chat history from device backup archives
//!
//! This library extracts a chat application's data from a full device backup
//! and re-renders it as paginated, browsable documents. It supports:
//!
//! - Discovering candidate backups on a host path and parsing their metadata
//! - Loading a backup's file manifest (database or legacy binary encoding)
//!   into a queryable virtual-file index
//! - Streaming each conversation's records above a persisted high-water mark,
//!   so later runs resume without reprocessing already-exported data
//! - Merging newly rendered fragments with the previous run's binary fragment
//!   log and splitting the result into on-demand pages
//!
//! # Example
//!
//! ```no_run
//! use mobile_chat_exporter::{ExportOptions, Exporter, PassOutcome};
//!
//! let exporter = Exporter::new(
//!     "/backups/0000-device",
//!     "/exports/device",
//!     "AppDomain-com.example.messenger",
//!     ExportOptions::default(),
//! );
//! exporter.start()?;
//! assert_eq!(exporter.wait_for_completion(), Some(PassOutcome::Completed));
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod backup;
pub mod cli;
pub mod export;
pub mod models;
pub mod render;
pub mod store;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use backup::{BackupIndex, discover_backups, parse_backup_directory};
pub use export::{ExportFormat, ExportOptions, Exporter, PageOrder, PassOutcome};
pub use models::{Account, BackupFileRecord, BackupManifest, ChatRecord, Conversation};
pub use store::{RecordEnumerator, discover_accounts};
