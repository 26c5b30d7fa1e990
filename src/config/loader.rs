//! Load named bundles from `<root>/<name>.json` and keep them for the store's lifetime.

use crate::config::types::{ConfigBundle, DatabaseConfig, UploadConfig};
use crate::error::ConfigError;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Env var naming the bundle directory. Default `config`.
pub const CONFIG_DIR_ENV: &str = "CRUD_KIT_CONFIG_DIR";

pub fn config_root() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"))
}

/// Bundle cache. Each name is read from disk at most once until [`ConfigStore::clear_cache`].
#[derive(Debug)]
pub struct ConfigStore {
    root: PathBuf,
    cache: RwLock<HashMap<String, Arc<ConfigBundle>>>,
}

impl ConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ConfigStore {
            root: root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Store rooted at `CRUD_KIT_CONFIG_DIR`.
    pub fn from_env() -> Self {
        Self::new(config_root())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cached bundle for `name`, loading it on first request.
    pub fn get(&self, name: &str) -> Result<Arc<ConfigBundle>, ConfigError> {
        if let Some(bundle) = self.read_cache().get(name) {
            return Ok(bundle.clone());
        }
        let loaded = Arc::new(self.load(name)?);
        let mut cache = self
            .cache
            .write()
            .map_err(|_| ConfigError::Load("config cache lock poisoned".into()))?;
        // A concurrent loader may have won the race; keep its value.
        let bundle = cache.entry(name.to_string()).or_insert(loaded).clone();
        Ok(bundle)
    }

    /// Forget every cached bundle. Open connections are not touched.
    pub fn clear_cache(&self) {
        match self.cache.write() {
            Ok(mut cache) => cache.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
        tracing::debug!("config cache cleared");
    }

    pub fn database(&self) -> Result<DatabaseConfig, ConfigError> {
        self.get("database")?.parse()
    }

    pub fn upload(&self) -> Result<UploadConfig, ConfigError> {
        self.get("upload")?.parse()
    }

    fn read_cache(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<ConfigBundle>>> {
        match self.cache.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn load(&self, name: &str) -> Result<ConfigBundle, ConfigError> {
        if !is_bundle_name(name) {
            return Err(ConfigError::NotFound(name.to_string()));
        }
        let path = self.root.join(format!("{}.json", name));
        let raw = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(name.to_string()));
            }
            Err(e) => return Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
        };
        let value: Value = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        match value {
            Value::Object(values) => {
                tracing::debug!(bundle = %name, path = %path.display(), "config bundle loaded");
                Ok(ConfigBundle::new(name, values))
            }
            _ => Err(ConfigError::Load(format!(
                "{}: top level must be an object",
                path.display()
            ))),
        }
    }
}

/// Bundle names are plain file stems; anything else could escape the root.
fn is_bundle_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn store_with(files: &[(&str, &str)]) -> (tempfile::TempDir, ConfigStore) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in files {
            fs::write(dir.path().join(format!("{}.json", name)), body).unwrap();
        }
        let store = ConfigStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn second_get_returns_cached_value_until_cleared() {
        let (dir, store) = store_with(&[("upload", r#"{"directory": "/a", "max_size": 10}"#)]);
        let first = store.get("upload").unwrap();

        fs::write(dir.path().join("upload.json"), r#"{"directory": "/b", "max_size": 20}"#).unwrap();
        let second = store.get("upload").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.get_str("directory"), Some("/a"));

        store.clear_cache();
        let third = store.get("upload").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.get_str("directory"), Some("/b"));
    }

    #[test]
    fn missing_bundle_is_not_found() {
        let (_dir, store) = store_with(&[]);
        let err = store.get("database").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(ref n) if n == "database"));
    }

    #[test]
    fn path_like_names_are_not_found() {
        let (_dir, store) = store_with(&[("upload", "{}")]);
        assert!(matches!(store.get("../upload"), Err(ConfigError::NotFound(_))));
        assert!(matches!(store.get(""), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn non_object_bundle_is_load_error() {
        let (_dir, store) = store_with(&[("upload", "[1, 2]"), ("broken", "{")]);
        assert!(matches!(store.get("upload"), Err(ConfigError::Load(_))));
        assert!(matches!(store.get("broken"), Err(ConfigError::Load(_))));
    }

    #[test]
    fn typed_upload_view() {
        let (_dir, store) = store_with(&[(
            "upload",
            r#"{"directory": "/srv/uploads", "allowed_extensions": ["jpeg", "jpg", "png"], "max_size": 2097152}"#,
        )]);
        let cfg = store.upload().unwrap();
        assert_eq!(cfg.directory, PathBuf::from("/srv/uploads"));
        assert_eq!(cfg.allowed_extensions, vec!["jpeg", "jpg", "png"]);
        assert_eq!(cfg.max_size, 2 * 1024 * 1024);
    }
}
