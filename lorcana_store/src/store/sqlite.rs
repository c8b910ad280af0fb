//! SQLite-backed document store
//!
//! Each document is one row of the `documents` table. Uses parameterized
//! queries exclusively; every replace runs in its own transaction.

use super::{DocumentKind, DocumentStore};
use crate::error::{Result, StoreError};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Document store holding all documents in a single SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) the database file and initialize the schema
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        log::info!("Opened document database: {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    /// In-memory database, used by tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Create the documents table if it doesn't exist
fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS documents (
            name TEXT PRIMARY KEY,
            body TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )
}

fn encode(kind: DocumentKind, document: &Value, location: &Path) -> Result<String> {
    serde_json::to_string_pretty(document).map_err(|e| {
        log::error!("Failed to encode {} document: {}", kind, e);
        StoreError::io(location, e.into())
    })
}

impl DocumentStore for SqliteStore {
    fn ensure(&self, kind: DocumentKind) -> Result<()> {
        let body = encode(kind, &kind.empty_document(), &self.location(kind))?;
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO documents (name, body) VALUES (?1, ?2)",
            params![kind.key(), body],
        )?;
        if inserted > 0 {
            log::info!("Created empty {} document in {}", kind, self.path.display());
        }
        Ok(())
    }

    fn exists(&self, kind: DocumentKind) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM documents WHERE name = ?1",
            params![kind.key()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn read_all(&self, kind: DocumentKind) -> Result<Value> {
        let body: Option<String> = self
            .conn()
            .query_row(
                "SELECT body FROM documents WHERE name = ?1",
                params![kind.key()],
                |row| row.get(0),
            )
            .optional()?;

        let location = self.location(kind);
        match body {
            Some(body) => serde_json::from_str(&body).map_err(|e| StoreError::corrupt(location, e)),
            None => Err(StoreError::io(
                location,
                std::io::Error::new(std::io::ErrorKind::NotFound, "document not created"),
            )),
        }
    }

    fn replace_all(&self, kind: DocumentKind, document: &Value) -> Result<()> {
        let body = encode(kind, document, &self.location(kind))?;
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO documents (name, body, updated_at)
             VALUES (?1, ?2, datetime('now'))",
            params![kind.key(), &body],
        )?;
        tx.commit()?;
        log::debug!("Wrote {} document ({} bytes)", kind, body.len());
        Ok(())
    }

    fn size_of(&self, kind: DocumentKind) -> Result<Option<u64>> {
        let size: Option<i64> = self
            .conn()
            .query_row(
                "SELECT length(CAST(body AS BLOB)) FROM documents WHERE name = ?1",
                params![kind.key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(size.map(|s| s as u64))
    }

    fn location(&self, kind: DocumentKind) -> PathBuf {
        PathBuf::from(format!("{}#{}", self.path.display(), kind.key()))
    }
}
