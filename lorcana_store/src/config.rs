//! Data directory layout

use crate::error::{Result, StoreError};
use std::path::{Path, PathBuf};

/// Locations of everything the store keeps on disk, derived from one data directory
#[derive(Debug, Clone)]
pub struct StoreConfig {
    data_dir: PathBuf,
}

impl StoreConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the default data directory: ~/.local/share/lorcana_store
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lorcana_store")
    }

    /// Directory holding the live document files
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }

    pub fn export_dir(&self) -> PathBuf {
        self.data_dir.join("exports")
    }

    /// Spool directory for uploaded import/restore payloads
    pub fn upload_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    /// Database file used by the SQLite backend
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("catalog.db")
    }

    /// Create the data, backup, export and upload directories if missing
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [
            self.data_dir.clone(),
            self.backup_dir(),
            self.export_dir(),
            self.upload_dir(),
        ] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
                log::info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn paths_hang_off_data_dir() {
        let config = StoreConfig::new("/srv/lorcana");
        assert_eq!(config.backup_dir(), PathBuf::from("/srv/lorcana/backups"));
        assert_eq!(config.export_dir(), PathBuf::from("/srv/lorcana/exports"));
        assert_eq!(config.upload_dir(), PathBuf::from("/srv/lorcana/uploads"));
        assert_eq!(config.sqlite_path(), PathBuf::from("/srv/lorcana/catalog.db"));
    }

    #[test]
    fn ensure_directories_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path().join("data"));

        config.ensure_directories().unwrap();
        config.ensure_directories().unwrap();

        assert!(config.backup_dir().is_dir());
        assert!(config.export_dir().is_dir());
        assert!(config.upload_dir().is_dir());
    }

    #[test]
    fn default_data_dir_ends_with_crate_name() {
        assert!(StoreConfig::default_data_dir().ends_with("lorcana_store"));
    }
}
