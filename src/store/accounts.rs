//! Account and conversation discovery.
//!
//! Each account keeps its data under `Documents/<user_id>/`, with a
//! `DB/sessions.sqlite` store naming the account and listing its
//! conversations. Accounts whose session store is unreadable are skipped
//! with a warning so one broken account cannot sink the whole pass.

use anyhow::{Context, Result};
use rusqlite::{Connection, OpenFlags};

use crate::backup::BackupIndex;
use crate::models::{Account, Conversation};

/// Virtual-path prefix all per-account data lives under.
pub const DOCUMENTS_PREFIX: &str = "Documents/";

const SESSIONS_DB_SUFFIX: &str = "/DB/sessions.sqlite";

/// Virtual path of one conversation's message store.
pub fn message_store_path(user_id: &str, conversation_id: &str) -> String {
    format!("{DOCUMENTS_PREFIX}{user_id}/DB/messages_{conversation_id}.sqlite")
}

/// Find every account in the loaded index, each owning its conversations
/// sorted by most recent message first.
pub fn discover_accounts(index: &BackupIndex) -> Result<Vec<Account>> {
    let mut accounts = Vec::new();

    for record in index.find_range(DOCUMENTS_PREFIX) {
        let Some(user_id) = session_store_owner(&record.relative_path) else {
            continue;
        };

        let real_path = index.resolve_real_path(record);
        match load_account(&real_path, user_id) {
            Ok(account) => accounts.push(account),
            Err(e) => {
                eprintln!("Warning: skipping account {}: {:#}", user_id, e);
            }
        }
    }

    Ok(accounts)
}

/// `Documents/<user>/DB/sessions.sqlite` → `<user>`; anything else → None.
fn session_store_owner(relative_path: &str) -> Option<&str> {
    let rest = relative_path.strip_prefix(DOCUMENTS_PREFIX)?;
    let user_id = rest.strip_suffix(SESSIONS_DB_SUFFIX)?;
    if user_id.is_empty() || user_id.contains('/') {
        return None;
    }
    Some(user_id)
}

fn load_account(store_path: &std::path::Path, user_id: &str) -> Result<Account> {
    let conn = Connection::open_with_flags(store_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("Failed to open session store {}", store_path.display()))?;

    let display_name: String = conn
        .query_row("SELECT display_name FROM account LIMIT 1", [], |row| row.get(0))
        .unwrap_or_default();

    let mut stmt = conn
        .prepare(
            "SELECT conversation_id, display_name, record_count, last_message_time \
             FROM session",
        )
        .context("Session store has no session table")?;
    let mut conversations = stmt
        .query_map([], |row| {
            let conversation_id: String = row.get(0)?;
            Ok(Conversation {
                store_path: message_store_path(user_id, &conversation_id),
                conversation_id,
                display_name: row.get(1)?,
                record_count: row.get::<_, Option<u32>>(2)?.unwrap_or(0),
                last_message_time: row.get::<_, Option<i64>>(3)?.unwrap_or(0),
                output_name: None,
            })
        })?
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to read session rows")?;

    conversations.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));

    Ok(Account {
        user_id: user_id.to_string(),
        display_name,
        conversations,
    })
}
