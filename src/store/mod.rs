//! Durable mapping from `(session_id, file_id)` / `(session_id, filename)` to
//! file metadata records, backed by an embedded SQLite database.

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL,
    filename TEXT NOT NULL,
    filepath TEXT NOT NULL,
    size INTEGER NOT NULL,
    content_type TEXT NOT NULL,
    original_filename TEXT NOT NULL,
    etag TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    UNIQUE(session_id, filename)
);
CREATE INDEX IF NOT EXISTS idx_files_last_modified ON files(last_modified);
CREATE INDEX IF NOT EXISTS idx_files_session_id ON files(session_id);
";

/// A persisted file record (see the data model's invariants on uniqueness
/// and on-disk size agreement).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct FileRecord {
    pub id: String,
    pub session_id: String,
    pub filename: String,
    pub filepath: String,
    pub size: u64,
    pub content_type: String,
    pub original_filename: String,
    pub etag: String,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// Candidate fields for an upsert. `id` is always freshly generated by the
/// caller (the engine or the upload collaborator) — on an update this
/// replaces the row's existing id, matching the documented upsert contract.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub id: String,
    pub session_id: String,
    pub filename: String,
    pub filepath: String,
    pub size: u64,
    pub content_type: String,
    pub original_filename: String,
    pub etag: String,
}

/// Thread-safe handle to the metadata database.
///
/// Each operation is dispatched to a blocking task so the synchronous
/// `rusqlite` API never stalls the async runtime; the underlying
/// `Connection` is guarded by a plain `Mutex` since access is always
/// synchronous once inside the blocking task.
#[derive(Clone)]
pub struct MetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl MetadataStore {
    /// Open (creating if absent) the database file at `path` and ensure the
    /// schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, primarily for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or, for an existing `(session_id, filename)`, update a record.
    /// Atomic per call.
    pub async fn upsert(&self, candidate: NewFileRecord) -> Result<FileRecord, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || upsert_blocking(&conn, candidate))
            .await
            .expect("metadata store blocking task panicked")
    }

    pub async fn get(&self, session_id: &str, file_id: &str) -> Result<FileRecord, StoreError> {
        let conn = self.conn.clone();
        let session_id = session_id.to_string();
        let file_id = file_id.to_string();
        tokio::task::spawn_blocking(move || get_blocking(&conn, &session_id, &file_id))
            .await
            .expect("metadata store blocking task panicked")
    }

    pub async fn list(&self, session_id: &str) -> Result<Vec<FileRecord>, StoreError> {
        let conn = self.conn.clone();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || list_blocking(&conn, &session_id))
            .await
            .expect("metadata store blocking task panicked")
    }

    pub async fn delete(&self, session_id: &str, file_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.clone();
        let session_id = session_id.to_string();
        let file_id = file_id.to_string();
        tokio::task::spawn_blocking(move || delete_blocking(&conn, &session_id, &file_id))
            .await
            .expect("metadata store blocking task panicked")
    }

    /// Select-then-delete every row older than `max_age`, returning exactly
    /// the rows removed. Guarded by a single transaction so the returned set
    /// equals the deleted set even under concurrent writers.
    pub async fn reap(&self, max_age: Duration) -> Result<Vec<FileRecord>, StoreError> {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || reap_blocking(&conn, max_age))
            .await
            .expect("metadata store blocking task panicked")
    }
}

fn upsert_blocking(
    conn: &Mutex<Connection>,
    candidate: NewFileRecord,
) -> Result<FileRecord, StoreError> {
    let mut guard = conn.lock().expect("metadata store mutex poisoned");
    let tx = guard.transaction()?;
    let now = Utc::now();

    let existing_created_at: Option<String> = tx
        .query_row(
            "SELECT created_at FROM files WHERE session_id = ?1 AND filename = ?2",
            params![candidate.session_id, candidate.filename],
            |row| row.get(0),
        )
        .optional()?;

    let created_at = match existing_created_at {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now),
        None => now,
    };

    tx.execute(
        "INSERT INTO files (id, session_id, filename, filepath, size, content_type, original_filename, etag, created_at, last_modified)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(session_id, filename) DO UPDATE SET
            id = excluded.id,
            filepath = excluded.filepath,
            size = excluded.size,
            content_type = excluded.content_type,
            original_filename = excluded.original_filename,
            etag = excluded.etag,
            last_modified = excluded.last_modified",
        params![
            candidate.id,
            candidate.session_id,
            candidate.filename,
            candidate.filepath,
            candidate.size,
            candidate.content_type,
            candidate.original_filename,
            candidate.etag,
            created_at.to_rfc3339(),
            now.to_rfc3339(),
        ],
    )?;

    let record = tx.query_row(
        "SELECT id, session_id, filename, filepath, size, content_type, original_filename, etag, created_at, last_modified
         FROM files WHERE session_id = ?1 AND filename = ?2",
        params![candidate.session_id, candidate.filename],
        row_to_record,
    )?;

    tx.commit()?;
    Ok(record)
}

fn get_blocking(
    conn: &Mutex<Connection>,
    session_id: &str,
    file_id: &str,
) -> Result<FileRecord, StoreError> {
    let guard = conn.lock().expect("metadata store mutex poisoned");
    guard
        .query_row(
            "SELECT id, session_id, filename, filepath, size, content_type, original_filename, etag, created_at, last_modified
             FROM files WHERE session_id = ?1 AND id = ?2",
            params![session_id, file_id],
            row_to_record,
        )
        .optional()?
        .ok_or(StoreError::NotFound)
}

fn list_blocking(conn: &Mutex<Connection>, session_id: &str) -> Result<Vec<FileRecord>, StoreError> {
    let guard = conn.lock().expect("metadata store mutex poisoned");
    let mut stmt = guard.prepare(
        "SELECT id, session_id, filename, filepath, size, content_type, original_filename, etag, created_at, last_modified
         FROM files WHERE session_id = ?1",
    )?;
    let rows = stmt
        .query_map(params![session_id], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn delete_blocking(
    conn: &Mutex<Connection>,
    session_id: &str,
    file_id: &str,
) -> Result<bool, StoreError> {
    let guard = conn.lock().expect("metadata store mutex poisoned");
    let affected = guard.execute(
        "DELETE FROM files WHERE session_id = ?1 AND id = ?2",
        params![session_id, file_id],
    )?;
    Ok(affected > 0)
}

fn reap_blocking(conn: &Mutex<Connection>, max_age: Duration) -> Result<Vec<FileRecord>, StoreError> {
    let mut guard = conn.lock().expect("metadata store mutex poisoned");
    let tx = guard.transaction()?;
    let cutoff = (Utc::now() - max_age).to_rfc3339();

    let reaped = {
        let mut stmt = tx.prepare(
            "SELECT id, session_id, filename, filepath, size, content_type, original_filename, etag, created_at, last_modified
             FROM files WHERE last_modified < ?1",
        )?;
        stmt.query_map(params![cutoff], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?
    };

    tx.execute("DELETE FROM files WHERE last_modified < ?1", params![cutoff])?;
    tx.commit()?;
    Ok(reaped)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let created_at_raw: String = row.get(8)?;
    let last_modified_raw: String = row.get(9)?;
    Ok(FileRecord {
        id: row.get(0)?,
        session_id: row.get(1)?,
        filename: row.get(2)?,
        filepath: row.get(3)?,
        size: row.get(4)?,
        content_type: row.get(5)?,
        original_filename: row.get(6)?,
        etag: row.get(7)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        last_modified: DateTime::parse_from_rfc3339(&last_modified_raw)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
