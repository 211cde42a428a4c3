use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults;

/// On-disk layout: the SQLite database and the lexical cache directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for everything lore persists.
    pub storage_dir: PathBuf,
    /// Database file name under `storage_dir`.
    pub db_file: String,
    /// Lexical cache directory name under `storage_dir`.
    pub cache_dir: String,
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.storage_dir.join(&self.db_file)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.storage_dir.join(&self.cache_dir)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("storage"),
            db_file: defaults::DEFAULT_DB_FILE.to_string(),
            cache_dir: defaults::DEFAULT_CACHE_DIR.to_string(),
        }
    }
}
