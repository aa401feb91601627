//! Shared test utilities for integration tests
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use rusqlite::{Connection, params};
use sha1::{Digest, Sha1};
use tempfile::TempDir;

use mobile_chat_exporter::export::ExportNotifier;

/// Domain the CLI exports from by default; tests use the same one.
pub const TEST_DOMAIN: &str = "AppDomain-com.example.messenger";

/// `(local_id, create_time, content)`
pub type RecordSpec = (i64, i64, String);

pub fn records(specs: &[(i64, i64, &str)]) -> Vec<RecordSpec> {
    specs.iter().map(|(id, time, content)| (*id, *time, content.to_string())).collect()
}

/// `n` records with ids `1..=n`, predictable contents `msg-<id>`.
pub fn numbered_records(n: i64) -> Vec<RecordSpec> {
    (1..=n).map(|id| (id, 1_000 + id, format!("msg-{id}"))).collect()
}

struct ConversationSpec {
    conversation_id: String,
    display_name: String,
    records: Vec<RecordSpec>,
}

struct AccountSpec {
    user_id: String,
    display_name: String,
    conversations: Vec<ConversationSpec>,
}

/// Builder for fake device-backup directories.
///
/// Produces a complete backup: `Info.plist`, `Manifest.plist`, a manifest in
/// either physical encoding, and content-addressed files for every staged
/// virtual file (session stores, message stores, extras).
pub struct BackupDirBuilder {
    device_name: String,
    legacy: bool,
    encrypted: bool,
    accounts: Vec<AccountSpec>,
    extra_files: Vec<(String, Vec<u8>)>,
}

impl BackupDirBuilder {
    pub fn new() -> Self {
        Self {
            device_name: "Test Phone".to_string(),
            legacy: false,
            encrypted: false,
            accounts: Vec::new(),
            extra_files: Vec::new(),
        }
    }

    pub fn device_name(mut self, name: &str) -> Self {
        self.device_name = name.to_string();
        self
    }

    /// Use the legacy length-prefixed manifest encoding and flat file layout.
    pub fn legacy(mut self) -> Self {
        self.legacy = true;
        self
    }

    /// Mark the backup as encrypted in its descriptor.
    pub fn encrypted(mut self) -> Self {
        self.encrypted = true;
        self
    }

    pub fn with_account(mut self, user_id: &str, display_name: &str) -> Self {
        self.accounts.push(AccountSpec {
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            conversations: Vec::new(),
        });
        self
    }

    pub fn with_conversation(
        mut self,
        user_id: &str,
        conversation_id: &str,
        display_name: &str,
        records: Vec<RecordSpec>,
    ) -> Self {
        let account = self
            .accounts
            .iter_mut()
            .find(|a| a.user_id == user_id)
            .expect("add the account before its conversations");
        account.conversations.push(ConversationSpec {
            conversation_id: conversation_id.to_string(),
            display_name: display_name.to_string(),
            records,
        });
        self
    }

    /// Stage an arbitrary virtual file under the test domain.
    pub fn with_virtual_file(mut self, relative_path: &str, bytes: &[u8]) -> Self {
        self.extra_files.push((relative_path.to_string(), bytes.to_vec()));
        self
    }

    pub fn build(self) -> TestBackup {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let backup_dir = temp.path().to_path_buf();

        write_info_plist(&backup_dir, &self.device_name);
        write_manifest_plist(&backup_dir, self.encrypted);

        // Stage every virtual file's real bytes, then describe them in the
        // manifest encoding under test.
        let staging = TempDir::new().expect("Failed to create staging dir");
        let mut virtual_files: Vec<(String, Vec<u8>)> = self.extra_files;

        for account in &self.accounts {
            let sessions = staging.path().join(format!("sessions-{}.sqlite", account.user_id));
            build_session_store(&sessions, account);
            virtual_files.push((
                format!("Documents/{}/DB/sessions.sqlite", account.user_id),
                fs::read(&sessions).unwrap(),
            ));

            for conversation in &account.conversations {
                let store = staging.path().join(format!(
                    "messages-{}-{}.sqlite",
                    account.user_id, conversation.conversation_id
                ));
                build_message_store(&store, &conversation.records);
                virtual_files.push((
                    format!(
                        "Documents/{}/DB/messages_{}.sqlite",
                        account.user_id, conversation.conversation_id
                    ),
                    fs::read(&store).unwrap(),
                ));
            }
        }

        for (relative_path, bytes) in &virtual_files {
            let id = file_id_for(TEST_DOMAIN, relative_path);
            let real_path = if self.legacy {
                backup_dir.join(&id)
            } else {
                backup_dir.join(&id[..2]).join(&id)
            };
            fs::create_dir_all(real_path.parent().unwrap()).unwrap();
            fs::write(real_path, bytes).unwrap();
        }

        if self.legacy {
            write_mbdb_manifest(&backup_dir, &virtual_files);
        } else {
            write_db_manifest(&backup_dir, &virtual_files);
        }

        TestBackup { temp }
    }
}

pub struct TestBackup {
    temp: TempDir,
}

impl TestBackup {
    pub fn path(&self) -> &Path {
        self.temp.path()
    }
}

/// SHA-1 of `"<domain>-<path>"`, the content id both encodings resolve to.
pub fn file_id_for(domain: &str, relative_path: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(domain.as_bytes());
    hasher.update(b"-");
    hasher.update(relative_path.as_bytes());
    hasher.finalize().iter().map(|b| format!("{:02x}", b)).collect()
}

fn write_info_plist(backup_dir: &Path, device_name: &str) {
    let mut dict = plist::Dictionary::new();
    dict.insert("Device Name".to_string(), plist::Value::String(device_name.to_string()));
    dict.insert("Display Name".to_string(), plist::Value::String(device_name.to_string()));
    dict.insert(
        "Last Backup Date".to_string(),
        plist::Value::Date(plist::Date::from(std::time::SystemTime::now())),
    );
    dict.insert("iTunes Version".to_string(), plist::Value::String("12.8.2".to_string()));
    dict.insert("Product Version".to_string(), plist::Value::String("14.2".to_string()));
    plist::Value::Dictionary(dict)
        .to_file_xml(backup_dir.join("Info.plist"))
        .expect("Failed to write Info.plist");
}

fn write_manifest_plist(backup_dir: &Path, encrypted: bool) {
    let mut dict = plist::Dictionary::new();
    dict.insert("IsEncrypted".to_string(), plist::Value::Boolean(encrypted));
    dict.insert("Version".to_string(), plist::Value::String("10.0".to_string()));
    plist::Value::Dictionary(dict)
        .to_file_xml(backup_dir.join("Manifest.plist"))
        .expect("Failed to write Manifest.plist");
}

fn write_db_manifest(backup_dir: &Path, virtual_files: &[(String, Vec<u8>)]) {
    let conn = Connection::open(backup_dir.join("Manifest.db")).unwrap();
    conn.execute_batch(
        "CREATE TABLE Files (\
            fileID TEXT PRIMARY KEY, \
            domain TEXT, \
            relativePath TEXT, \
            flags INTEGER, \
            file BLOB)",
    )
    .unwrap();
    for (relative_path, _) in virtual_files {
        conn.execute(
            "INSERT INTO Files (fileID, domain, relativePath, flags, file) \
             VALUES (?1, ?2, ?3, 1, NULL)",
            params![file_id_for(TEST_DOMAIN, relative_path), TEST_DOMAIN, relative_path],
        )
        .unwrap();
    }
}

fn push_mbdb_string(buf: &mut Vec<u8>, value: Option<&str>) {
    match value {
        Some(s) => {
            buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        None => buf.extend_from_slice(&0xFFFFu16.to_be_bytes()),
    }
}

fn write_mbdb_manifest(backup_dir: &Path, virtual_files: &[(String, Vec<u8>)]) {
    let mut buf = b"mbdb\x05\x00".to_vec();
    for (relative_path, bytes) in virtual_files {
        push_mbdb_string(&mut buf, Some(TEST_DOMAIN));
        push_mbdb_string(&mut buf, Some(relative_path));
        push_mbdb_string(&mut buf, None); // link target
        push_mbdb_string(&mut buf, None); // data hash
        push_mbdb_string(&mut buf, None); // encryption key
        buf.extend_from_slice(&0x81A4u16.to_be_bytes()); // regular file
        buf.extend_from_slice(&0u64.to_be_bytes()); // inode
        buf.extend_from_slice(&501u32.to_be_bytes()); // uid
        buf.extend_from_slice(&501u32.to_be_bytes()); // gid
        buf.extend_from_slice(&1_600_000_000u32.to_be_bytes()); // mtime
        buf.extend_from_slice(&1_600_000_000u32.to_be_bytes()); // atime
        buf.extend_from_slice(&1_600_000_000u32.to_be_bytes()); // ctime
        buf.extend_from_slice(&(bytes.len() as u64).to_be_bytes());
        buf.push(0); // protection class
        buf.push(0); // property count
    }
    fs::write(backup_dir.join("Manifest.mbdb"), buf).unwrap();
}

fn build_session_store(path: &Path, account: &AccountSpec) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE account (user_id TEXT, display_name TEXT); \
         CREATE TABLE session (\
            conversation_id TEXT, \
            display_name TEXT, \
            record_count INTEGER, \
            last_message_time INTEGER)",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO account (user_id, display_name) VALUES (?1, ?2)",
        params![account.user_id, account.display_name],
    )
    .unwrap();
    for conversation in &account.conversations {
        let last_time = conversation.records.iter().map(|(_, t, _)| *t).max().unwrap_or(0);
        conn.execute(
            "INSERT INTO session (conversation_id, display_name, record_count, last_message_time) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                conversation.conversation_id,
                conversation.display_name,
                conversation.records.len() as i64,
                last_time
            ],
        )
        .unwrap();
    }
}

fn build_message_store(path: &Path, records: &[RecordSpec]) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE message (\
            local_id INTEGER PRIMARY KEY, \
            create_time INTEGER NOT NULL, \
            kind INTEGER NOT NULL DEFAULT 0, \
            outbound INTEGER NOT NULL DEFAULT 0, \
            content TEXT NOT NULL)",
    )
    .unwrap();
    for (id, time, content) in records {
        conn.execute(
            "INSERT INTO message (local_id, create_time, kind, outbound, content) \
             VALUES (?1, ?2, 0, 0, ?3)",
            params![id, time, content],
        )
        .unwrap();
    }
}

/// Notifier that counts per-record progress events across a pass.
#[derive(Default)]
pub struct CountingNotifier {
    pub progress_events: AtomicU32,
}

impl ExportNotifier for CountingNotifier {
    fn on_conversation_progress(&self, _conversation_id: &str, _done: u32, _total: u32) {
        self.progress_events.fetch_add(1, Ordering::SeqCst);
    }
}

/// Output directory that outlives a single pass, for incremental scenarios.
pub struct OutputDir {
    temp: TempDir,
}

impl OutputDir {
    pub fn new() -> Self {
        Self { temp: TempDir::new().expect("Failed to create output dir") }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn file(&self, relative: &str) -> PathBuf {
        self.temp.path().join(relative)
    }
}
