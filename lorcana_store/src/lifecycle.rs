//! Bulk import, export, backup, restore and data statistics
//!
//! Snapshots (exports and backups) are single JSON files holding every
//! document that currently exists, keyed by document name, plus an info
//! block. A restore replaces each document present in the backup and leaves
//! the others alone.

use crate::config::StoreConfig;
use crate::error::{json_kind, Result, StoreError};
use crate::ids::IdGenerator;
use crate::models::{now_timestamp, Card, CardSet, Collection, Metadata, Prices};
use crate::normalize::{normalize, ImportKind, NormalizedImport};
use crate::store::{read_json, write_json_atomic, Change, DocumentKind, Records, DATA_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The only export format
pub const EXPORT_FORMAT: &str = "json";

/// Outcome of a successful import
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResult {
    pub success: bool,
    pub imported: usize,
    pub message: String,
}

/// Outcome of a successful restore
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreResult {
    pub success: bool,
    /// Document keys that were replaced, in snapshot order
    pub restored_files: Vec<String>,
    pub backup_timestamp: Option<String>,
    pub message: String,
}

/// Record counts and stored sizes per document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStats {
    pub cards: usize,
    pub sets: usize,
    pub prices: usize,
    pub collections: usize,
    pub last_update: Option<String>,
    /// Bytes per existing document, keyed by document name
    pub files_sizes: BTreeMap<String, u64>,
}

/// Data lifecycle service
#[derive(Clone)]
pub struct DataLifecycle {
    records: Records,
    ids: Arc<dyn IdGenerator>,
    config: StoreConfig,
}

/// Deletes an uploaded file when dropped, whatever happened to the import
struct UploadCleanup<'a>(&'a Path);

impl Drop for UploadCleanup<'_> {
    fn drop(&mut self) {
        match std::fs::remove_file(self.0) {
            Ok(()) => log::debug!("Removed upload {}", self.0.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::warn!("Failed to remove upload {}: {}", self.0.display(), e),
        }
    }
}

impl DataLifecycle {
    pub fn new(records: Records, ids: Arc<dyn IdGenerator>, config: StoreConfig) -> Self {
        Self {
            records,
            ids,
            config,
        }
    }

    /// Write an uploaded payload to the upload directory and return its path
    pub fn spool_upload(&self, body: &[u8]) -> Result<PathBuf> {
        let dir = self.config.upload_dir();
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;

        let path = dir.join(format!("upload-{}.json", self.ids.file_token()));
        std::fs::write(&path, body).map_err(|e| StoreError::io(&path, e))?;
        log::debug!("Spooled {} byte upload to {}", body.len(), path.display());
        Ok(path)
    }

    /// Import the JSON file at `path`, deleting it afterwards on success and failure
    pub fn import_file(&self, kind: ImportKind, path: &Path) -> Result<ImportResult> {
        let _cleanup = UploadCleanup(path);
        let raw = read_json(path)?;
        self.import_value(kind, &raw)
    }

    /// Normalize `raw` and replace the whole `kind` document with it
    pub fn import_value(&self, kind: ImportKind, raw: &Value) -> Result<ImportResult> {
        let now = now_timestamp();
        let normalized = normalize(kind, raw, self.ids.as_ref(), &now)?;
        let imported = normalized.len();

        match &normalized {
            NormalizedImport::Cards(cards) => self.records.save(DocumentKind::Cards, cards)?,
            NormalizedImport::Sets(sets) => self.records.save(DocumentKind::Sets, sets)?,
            NormalizedImport::Prices(prices) => self.records.save(DocumentKind::Prices, prices)?,
        }

        let mut bookkeeping = Map::new();
        bookkeeping.insert(format!("{}_imported", kind), json!(imported));
        bookkeeping.insert(format!("last_{}_import", kind), json!(now));
        self.update_metadata(bookkeeping)?;

        log::info!("Imported {} {}", imported, kind);
        let message = match kind {
            ImportKind::Prices => format!("Successfully imported prices for {} cards", imported),
            _ => format!("Successfully imported {} {}", imported, kind),
        };
        Ok(ImportResult {
            success: true,
            imported,
            message,
        })
    }

    /// Write a snapshot of all documents to the export directory
    pub fn export(&self, format: &str) -> Result<PathBuf> {
        if format != EXPORT_FORMAT {
            return Err(StoreError::UnsupportedFormat(format.to_string()));
        }

        let timestamp = now_timestamp();
        let (mut snapshot, _) = self.snapshot()?;
        snapshot.insert(
            "exportInfo".to_string(),
            json!({
                "timestamp": timestamp,
                "version": DATA_VERSION,
                "format": format,
            }),
        );

        let path = self.config.export_dir().join(format!(
            "lorcana-export-{}-{}.{}",
            date_part(&timestamp),
            self.ids.file_token(),
            format
        ));
        self.write_snapshot(&path, &snapshot)?;
        log::info!("Exported data to {}", path.display());
        Ok(path)
    }

    /// Write a snapshot of all documents to the backup directory
    pub fn backup(&self) -> Result<PathBuf> {
        let timestamp = now_timestamp();
        let (mut snapshot, files) = self.snapshot()?;
        snapshot.insert(
            "backupInfo".to_string(),
            json!({
                "timestamp": timestamp,
                "version": DATA_VERSION,
                "files": files,
            }),
        );

        let path = self.config.backup_dir().join(format!(
            "backup-{}-{}.json",
            date_part(&timestamp),
            self.ids.file_token()
        ));
        self.write_snapshot(&path, &snapshot)?;
        log::info!("Created backup {} ({} documents)", path.display(), files.len());
        Ok(path)
    }

    /// Restore documents from the backup file at `path`
    ///
    /// Every document in the backup is checked before anything is written. The
    /// backup's metadata is merged over the live metadata together with
    /// `restored_from_backup` and `backup_timestamp`. The file is deleted only
    /// if the restore succeeds.
    pub fn restore(&self, path: &Path) -> Result<RestoreResult> {
        let mut backup = match read_json(path)? {
            Value::Object(backup) => backup,
            other => {
                return Err(StoreError::InvalidBackupFormat(format!(
                    "expected an object, got {}",
                    json_kind(&other)
                )))
            }
        };
        let Some(info) = backup.remove("backupInfo") else {
            return Err(StoreError::InvalidBackupFormat("missing backupInfo".to_string()));
        };
        let backup_timestamp = info
            .get("timestamp")
            .and_then(Value::as_str)
            .map(str::to_string);

        let mut documents = Vec::new();
        for kind in DocumentKind::ALL {
            match backup.remove(kind.key()) {
                None | Some(Value::Null) => {}
                Some(document) if kind.accepts(&document) => {
                    check_records(kind, &document).map_err(|e| {
                        StoreError::InvalidBackupFormat(format!("{} has an unreadable record: {}", kind, e))
                    })?;
                    documents.push((kind, document));
                }
                Some(document) => {
                    return Err(StoreError::InvalidBackupFormat(format!(
                        "{} must be {}, got {}",
                        kind,
                        if kind.is_mapping() { "an object" } else { "an array" },
                        json_kind(&document)
                    )))
                }
            }
        }

        let mut restored_files = Vec::with_capacity(documents.len());
        for (kind, document) in documents {
            match (kind, document) {
                (DocumentKind::Metadata, Value::Object(fields)) => {
                    let provenance = backup_timestamp.clone();
                    self.records
                        .update(DocumentKind::Metadata, |live: &mut Metadata| {
                            live.extend(fields);
                            live.insert("restored_from_backup".to_string(), json!(now_timestamp()));
                            live.insert("backup_timestamp".to_string(), json!(provenance));
                            Ok(Change::Write(()))
                        })?;
                }
                (kind, document) => self.records.save(kind, &document)?,
            }
            restored_files.push(kind.key().to_string());
        }

        std::fs::remove_file(path).map_err(|e| StoreError::io(path, e))?;
        log::info!(
            "Restored {} documents from {} ({})",
            restored_files.len(),
            path.display(),
            backup_timestamp.as_deref().unwrap_or("no timestamp")
        );

        Ok(RestoreResult {
            success: true,
            message: format!("Successfully restored {} data files", restored_files.len()),
            restored_files,
            backup_timestamp,
        })
    }

    /// Count records and measure each existing document; never creates documents
    pub fn data_stats(&self) -> Result<DataStats> {
        let store = self.records.store();
        let mut stats = DataStats::default();

        for kind in DocumentKind::ALL {
            if !store.exists(kind)? {
                continue;
            }
            let document = store.read_all(kind)?;

            if kind == DocumentKind::Metadata {
                stats.last_update = document
                    .get("last_update")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                continue;
            }

            let count = match &document {
                Value::Array(items) => items.len(),
                Value::Object(entries) => entries.len(),
                _ => 0,
            };
            match kind {
                DocumentKind::Cards => stats.cards = count,
                DocumentKind::Sets => stats.sets = count,
                DocumentKind::Prices => stats.prices = count,
                DocumentKind::Collections => stats.collections = count,
                DocumentKind::Metadata => {}
            }
            if let Some(size) = store.size_of(kind)? {
                stats.files_sizes.insert(kind.key().to_string(), size);
            }
        }

        Ok(stats)
    }

    /// Merge `patch` into the metadata document and stamp `last_update`
    pub fn update_metadata(&self, patch: Metadata) -> Result<Metadata> {
        self.records
            .update(DocumentKind::Metadata, |metadata: &mut Metadata| {
                metadata.extend(patch);
                metadata.insert("last_update".to_string(), json!(now_timestamp()));
                Ok(Change::Write(metadata.clone()))
            })
    }

    /// Every existing document keyed by name, plus the list of keys included
    fn snapshot(&self) -> Result<(Map<String, Value>, Vec<&'static str>)> {
        let store = self.records.store();
        let mut snapshot = Map::new();
        let mut files = Vec::new();

        for kind in DocumentKind::ALL {
            let _guard = self.records.lock(kind);
            if !store.exists(kind)? {
                continue;
            }
            snapshot.insert(kind.key().to_string(), store.read_all(kind)?);
            files.push(kind.key());
        }

        Ok((snapshot, files))
    }

    fn write_snapshot(&self, path: &Path, snapshot: &Map<String, Value>) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        let bytes = write_json_atomic(path, snapshot)?;
        log::debug!("Wrote snapshot {} ({} bytes)", path.display(), bytes);
        Ok(())
    }
}

/// Check that every record of `document` reads as its model
fn check_records(kind: DocumentKind, document: &Value) -> std::result::Result<(), serde_json::Error> {
    match kind {
        DocumentKind::Cards => Vec::<Card>::deserialize(document).map(drop),
        DocumentKind::Sets => Vec::<CardSet>::deserialize(document).map(drop),
        DocumentKind::Prices => Prices::deserialize(document).map(drop),
        DocumentKind::Collections => Vec::<Collection>::deserialize(document).map(drop),
        DocumentKind::Metadata => Metadata::deserialize(document).map(drop),
    }
}

/// `2026-02-01` from `2026-02-01T10:00:00.000Z`
fn date_part(timestamp: &str) -> &str {
    timestamp.split('T').next().unwrap_or(timestamp)
}
