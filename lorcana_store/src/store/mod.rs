//! Record store: whole-document read/replace over pluggable backends
//!
//! A [`DocumentStore`] knows how to persist one JSON document per
//! [`DocumentKind`]. It offers no concurrency control: two callers that both
//! read, modify and replace the same document will lose one of the changes.
//! [`Records`] sits on top and serializes read-modify-write cycles with one
//! in-process lock per document kind; every service goes through it.

mod file;
mod sqlite;

pub use file::{write_json_atomic, FileStore};
pub(crate) use file::read_json;
pub use sqlite::SqliteStore;

use crate::error::{Result, StoreError};
use crate::models::now_timestamp;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

/// Version stamped into new metadata documents and snapshots
pub const DATA_VERSION: &str = "1.0.0";

/// The five documents making up a data directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Cards,
    Sets,
    Prices,
    Collections,
    Metadata,
}

impl DocumentKind {
    /// All kinds, in snapshot order
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Cards,
        DocumentKind::Sets,
        DocumentKind::Prices,
        DocumentKind::Collections,
        DocumentKind::Metadata,
    ];

    /// Key used in snapshots and stats
    pub fn key(self) -> &'static str {
        match self {
            DocumentKind::Cards => "cards",
            DocumentKind::Sets => "sets",
            DocumentKind::Prices => "prices",
            DocumentKind::Collections => "collections",
            DocumentKind::Metadata => "metadata",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    pub fn file_name(self) -> &'static str {
        match self {
            DocumentKind::Cards => "cards.json",
            DocumentKind::Sets => "sets.json",
            DocumentKind::Prices => "prices.json",
            DocumentKind::Collections => "collections.json",
            DocumentKind::Metadata => "metadata.json",
        }
    }

    /// Whether the document is a mapping (`{}`) rather than a list (`[]`)
    pub fn is_mapping(self) -> bool {
        matches!(self, DocumentKind::Prices | DocumentKind::Metadata)
    }

    /// Does `value` have this document's top-level shape?
    pub fn accepts(self, value: &Value) -> bool {
        if self.is_mapping() {
            value.is_object()
        } else {
            value.is_array()
        }
    }

    /// Content written when the document is first created
    pub fn empty_document(self) -> Value {
        match self {
            DocumentKind::Metadata => json!({
                "last_update": now_timestamp(),
                "version": DATA_VERSION,
            }),
            DocumentKind::Prices => json!({}),
            _ => json!([]),
        }
    }

    fn index(self) -> usize {
        match self {
            DocumentKind::Cards => 0,
            DocumentKind::Sets => 1,
            DocumentKind::Prices => 2,
            DocumentKind::Collections => 3,
            DocumentKind::Metadata => 4,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Durable storage of whole JSON documents
pub trait DocumentStore: Send + Sync {
    /// Create the document with its empty default if it doesn't exist yet
    fn ensure(&self, kind: DocumentKind) -> Result<()>;

    /// Whether the document has been created
    fn exists(&self, kind: DocumentKind) -> Result<bool>;

    /// Read the full document; corrupt or unreadable content is an error
    fn read_all(&self, kind: DocumentKind) -> Result<Value>;

    /// Replace the full document; readers never observe a partial write
    fn replace_all(&self, kind: DocumentKind, document: &Value) -> Result<()>;

    /// Stored size in bytes, `None` if the document doesn't exist
    fn size_of(&self, kind: DocumentKind) -> Result<Option<u64>>;

    /// Where the document lives, for error messages and logs
    fn location(&self, kind: DocumentKind) -> PathBuf;
}

/// Outcome of a closure passed to [`Records::update`]
#[derive(Debug)]
pub enum Change<R> {
    /// The document was modified and must be written back
    Write(R),
    /// Nothing changed; skip the write
    Keep(R),
}

/// Typed, serialized access to a [`DocumentStore`]
#[derive(Clone)]
pub struct Records {
    store: Arc<dyn DocumentStore>,
    locks: Arc<[Mutex<()>; 5]>,
}

impl Records {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            locks: Arc::new(Default::default()),
        }
    }

    /// The unguarded backing store
    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Hold the per-document lock; the guard protects nothing but ordering
    pub(crate) fn lock(&self, kind: DocumentKind) -> MutexGuard<'_, ()> {
        self.locks[kind.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read a document as raw JSON, creating it first if needed
    pub fn read_raw(&self, kind: DocumentKind) -> Result<Value> {
        self.store.ensure(kind)?;
        self.store.read_all(kind)
    }

    /// Read and deserialize a document, creating it first if needed
    pub fn load<T: DeserializeOwned>(&self, kind: DocumentKind) -> Result<T> {
        let value = self.read_raw(kind)?;
        serde_json::from_value(value).map_err(|e| StoreError::corrupt(self.store.location(kind), e))
    }

    /// Replace a document under its lock
    pub fn save<T: Serialize + ?Sized>(&self, kind: DocumentKind, document: &T) -> Result<()> {
        let value = to_document(self.store.location(kind), document)?;
        let _guard = self.lock(kind);
        self.store.replace_all(kind, &value)
    }

    /// Read-modify-write a document while holding its lock
    ///
    /// The closure decides whether anything changed; on [`Change::Keep`] the
    /// document is not rewritten. An error from the closure aborts the update
    /// without writing.
    pub fn update<T, R, F>(&self, kind: DocumentKind, mutate: F) -> Result<R>
    where
        T: DeserializeOwned + Serialize,
        F: FnOnce(&mut T) -> Result<Change<R>>,
    {
        let _guard = self.lock(kind);
        let mut document: T = self.load(kind)?;

        match mutate(&mut document)? {
            Change::Write(result) => {
                let value = to_document(self.store.location(kind), &document)?;
                self.store.replace_all(kind, &value)?;
                Ok(result)
            }
            Change::Keep(result) => Ok(result),
        }
    }
}

fn to_document<T: Serialize + ?Sized>(location: PathBuf, document: &T) -> Result<Value> {
    serde_json::to_value(document).map_err(|e| StoreError::corrupt(location, e))
}
