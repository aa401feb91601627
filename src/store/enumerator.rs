//! Lazy ascending walk over one conversation's message store.

use std::collections::VecDeque;
use std::path::Path;

use rusqlite::{Connection, OpenFlags, params};

use crate::backup::BackupError;
use crate::models::ChatRecord;

/// Rows fetched per round trip into the SQLite store.
const FETCH_BATCH: usize = 256;

/// A restartable, finite enumerator over the records of one conversation.
///
/// Yields records with `local_id > min_exclusive_id` in ascending id order,
/// the same identifier space the export high-water mark lives in. Every
/// `open` is independent: nothing is cached across enumerators, so opening a
/// second one with a different threshold against the same store is always
/// safe.
#[derive(Debug)]
pub struct RecordEnumerator {
    conn: Connection,
    /// Largest id handed back by the batch query so far; next batch resumes
    /// strictly above it.
    cursor_id: i64,
    /// Largest id actually yielded to the caller, 0 before the first record.
    /// Lets the caller advance the high-water mark even when it stops
    /// consuming mid-stream.
    max_seen_id: i64,
    buffer: VecDeque<ChatRecord>,
    exhausted: bool,
}

impl RecordEnumerator {
    /// Open the store at `store_path`. A missing store is `NotFound`, which
    /// callers usually treat as "no records" rather than a failure.
    pub fn open(store_path: &Path, min_exclusive_id: i64) -> Result<Self, BackupError> {
        if !store_path.is_file() {
            return Err(BackupError::NotFound(store_path.to_path_buf()));
        }
        let conn = Connection::open_with_flags(store_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
        Ok(Self {
            conn,
            cursor_id: min_exclusive_id,
            max_seen_id: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        })
    }

    /// The next record in ascending id order, or `None` when the store is
    /// drained.
    pub fn next(&mut self) -> Result<Option<ChatRecord>, BackupError> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fill_buffer()?;
        }
        let record = self.buffer.pop_front();
        if let Some(record) = &record {
            self.max_seen_id = self.max_seen_id.max(record.local_id);
        }
        Ok(record)
    }

    /// Largest record id yielded so far; 0 when nothing has been yielded.
    pub fn max_seen_id(&self) -> i64 {
        self.max_seen_id
    }

    fn fill_buffer(&mut self) -> Result<(), BackupError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT local_id, create_time, kind, outbound, content FROM message \
             WHERE local_id > ?1 ORDER BY local_id ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![self.cursor_id, FETCH_BATCH as i64], |row| {
            Ok(ChatRecord {
                local_id: row.get(0)?,
                timestamp: row.get(1)?,
                kind: row.get(2)?,
                outbound: row.get::<_, i64>(3)? != 0,
                content: row.get(4)?,
            })
        })?;

        let mut fetched = 0;
        for row in rows {
            let record = row?;
            self.cursor_id = record.local_id;
            self.buffer.push_back(record);
            fetched += 1;
        }
        if fetched < FETCH_BATCH {
            self.exhausted = true;
        }
        Ok(())
    }
}
