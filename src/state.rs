//! Shared application state: one config store, one connection manager, one file manager.

use crate::config::ConfigStore;
use crate::database::Database;
use crate::files::{staging_root, FileManager};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigStore>,
    pub database: Arc<Database>,
    pub files: Arc<FileManager>,
}

impl AppState {
    pub fn new(config_root: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        let config = Arc::new(ConfigStore::new(config_root));
        AppState {
            database: Arc::new(Database::new(config.clone())),
            files: Arc::new(FileManager::new(config.clone(), staging_dir)),
            config,
        }
    }

    /// State from `.env` and process env (`CRUD_KIT_CONFIG_DIR`, `CRUD_KIT_STAGING_DIR`).
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let config = ConfigStore::from_env();
        Self::new(config.root().to_path_buf(), staging_root())
    }
}
