//! One pretty-printed JSON file per document

use super::{DocumentKind, DocumentStore};
use crate::error::{Result, StoreError};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Document store backed by `<dir>/<kind>.json` files
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, kind: DocumentKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }
}

impl DocumentStore for FileStore {
    fn ensure(&self, kind: DocumentKind) -> Result<()> {
        let path = self.path_for(kind);
        if path.exists() {
            return Ok(());
        }

        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        write_json_atomic(&path, &kind.empty_document())?;
        log::info!("Created empty {} document at {}", kind, path.display());
        Ok(())
    }

    fn exists(&self, kind: DocumentKind) -> Result<bool> {
        let path = self.path_for(kind);
        path.try_exists().map_err(|e| StoreError::io(path, e))
    }

    fn read_all(&self, kind: DocumentKind) -> Result<Value> {
        read_json(&self.path_for(kind))
    }

    fn replace_all(&self, kind: DocumentKind, document: &Value) -> Result<()> {
        let path = self.path_for(kind);
        std::fs::create_dir_all(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let bytes = write_json_atomic(&path, document)?;
        log::debug!("Wrote {} document ({} bytes)", kind, bytes);
        Ok(())
    }

    fn size_of(&self, kind: DocumentKind) -> Result<Option<u64>> {
        let path = self.path_for(kind);
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(Some(meta.len())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    fn location(&self, kind: DocumentKind) -> PathBuf {
        self.path_for(kind)
    }
}

/// Read and parse a JSON file
pub(crate) fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_str(&content).map_err(|e| StoreError::corrupt(path, e))
}

/// Write `value` as indented JSON to `path` via a sibling temp file and rename
///
/// The target is either the old content or the complete new content at every
/// point in time. Returns the number of bytes written.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<u64> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut body =
        serde_json::to_vec_pretty(value).map_err(|e| StoreError::io(path, e.into()))?;
    body.push(b'\n');

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    tmp.write_all(&body)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;

    Ok(body.len() as u64)
}
