//! Per-conversation message stores inside the backup.
//!
//! Accounts and their conversation lists are discovered by querying the
//! backup index for session databases under the documents prefix; each
//! conversation's messages then live in their own SQLite store, walked
//! lazily by [`RecordEnumerator`] in ascending record-id order.

pub mod accounts;
pub mod enumerator;

pub use accounts::{DOCUMENTS_PREFIX, discover_accounts, message_store_path};
pub use enumerator::RecordEnumerator;
