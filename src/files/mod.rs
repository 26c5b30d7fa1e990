//! Upload validation and relocation, stored-file deletion, size formatting and path helpers.
//!
//! Every operation here degrades to `None`, `false` or "0 bytes" instead of
//! returning an error, so page rendering never fails on a missing upload config.

mod descriptor;

pub use descriptor::{extension_of, stem_of, TransferError, UploadDescriptor};

use crate::config::ConfigStore;
use crate::helper::format_bytes;
use crate::model::Record;
use descriptor::is_within;
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::sync::{Arc, Mutex};

/// Env var naming the staging directory for inbound files.
pub const STAGING_DIR_ENV: &str = "CRUD_KIT_STAGING_DIR";

const MAX_FILENAME_LEN: usize = 255;

/// Base name used when the declared name has no safe characters left.
const FALLBACK_BASE: &str = "file";

pub fn staging_root() -> PathBuf {
    std::env::var(STAGING_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("crud-kit-staging"))
}

#[derive(Debug)]
pub struct FileManager {
    config: Arc<ConfigStore>,
    staging_dir: PathBuf,
    /// Canonical paths written by [`FileManager::stage`] and not yet consumed.
    staged: Mutex<HashSet<PathBuf>>,
}

impl FileManager {
    pub fn new(config: Arc<ConfigStore>, staging_dir: impl Into<PathBuf>) -> Self {
        FileManager {
            config,
            staging_dir: staging_dir.into(),
            staged: Mutex::new(HashSet::new()),
        }
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Write inbound bytes to the staging directory. The returned descriptor is
    /// the only kind of temp path [`FileManager::upload`] accepts.
    pub fn stage(&self, original_name: &str, bytes: &[u8]) -> io::Result<UploadDescriptor> {
        create_dir_all(&self.staging_dir)?;
        let tmp = self
            .staging_dir
            .join(format!("upload-{}.tmp", uuid::Uuid::new_v4().simple()));
        fs::write(&tmp, bytes)?;
        let canonical = tmp.canonicalize()?;
        self.staged_set().insert(canonical.clone());
        Ok(UploadDescriptor::new(canonical, original_name, bytes.len() as u64))
    }

    /// Remove a staged temp file that was not consumed by an upload.
    pub fn discard(&self, file: &UploadDescriptor) {
        let Ok(canonical) = file.tmp_path.canonicalize() else { return };
        if self.staged_set().remove(&canonical) {
            if let Err(e) = fs::remove_file(&canonical) {
                tracing::warn!(path = %canonical.display(), error = %e, "could not remove staged file");
            }
        }
    }

    /// True when `path` was staged by this manager, still exists, and has not been moved.
    pub fn is_uploaded_file(&self, path: &Path) -> bool {
        self.staged_path(path).is_some()
    }

    fn staged_path(&self, path: &Path) -> Option<PathBuf> {
        let canonical = path.canonicalize().ok()?;
        let genuine = canonical.is_file()
            && is_within(&self.staging_dir, &canonical)
            && self.staged_set().contains(&canonical);
        genuine.then_some(canonical)
    }

    /// Validate `file` and move it into `destination_dir` under a generated name.
    /// Returns the new file name (not the path), or `None` when anything fails.
    pub fn upload(
        &self,
        file: &UploadDescriptor,
        destination_dir: &Path,
        allowed_extensions: &[String],
        max_size: u64,
    ) -> Option<String> {
        if file.error != TransferError::Ok {
            tracing::debug!(name = %file.name, error = ?file.error, "upload rejected: transfer error");
            return None;
        }
        if file.size == 0 || file.size > max_size {
            tracing::debug!(name = %file.name, size = file.size, max_size, "upload rejected: size");
            return None;
        }
        let Some(source) = self.staged_path(&file.tmp_path) else {
            tracing::warn!(path = %file.tmp_path.display(), "upload rejected: not a staged upload");
            return None;
        };
        let ext = file.extension();
        if !allowed_extensions.is_empty() && !contains_extension(allowed_extensions, &ext) {
            tracing::debug!(name = %file.name, ext = %ext, "upload rejected: extension");
            return None;
        }

        let destination_dir = normalize_path(destination_dir);
        if !destination_dir.is_dir() {
            if let Err(e) = create_dir_all(&destination_dir) {
                tracing::warn!(dir = %destination_dir.display(), error = %e, "upload: cannot create directory");
                return None;
            }
        }
        if !is_writable(&destination_dir) {
            tracing::warn!(dir = %destination_dir.display(), "upload: directory not writable");
            return None;
        }

        let new_name = unique_name(&file.name, &ext);
        let destination = destination_dir.join(&new_name);
        if let Err(e) = move_file(&source, &destination) {
            tracing::warn!(to = %destination.display(), error = %e, "upload: move failed");
            return None;
        }
        self.staged_set().remove(&source);
        if !destination.exists() {
            tracing::warn!(path = %destination.display(), "upload: moved file missing");
            return None;
        }
        tracing::debug!(name = %file.name, stored = %new_name, "upload stored");
        Some(new_name)
    }

    /// [`FileManager::upload`] with directory, extensions and max size from the "upload" bundle.
    pub fn upload_configured(&self, file: &UploadDescriptor) -> Option<String> {
        let cfg = match self.config.upload() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = %e, "upload config unavailable");
                return None;
            }
        };
        self.upload(file, &cfg.directory, &cfg.allowed_extensions, cfg.max_size)
    }

    /// Remove the stored file named by `record[field]` from the upload directory.
    pub fn delete(&self, record: &Record, field: &str) -> bool {
        let name = match record.get(field) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => return false,
            Some(other) => other.to_string(),
        };
        match self.uploaded_file_path(&name) {
            Some(path) => delete_path(&path),
            None => false,
        }
    }

    /// Filesystem path of a stored file, or `None` without a usable upload config.
    pub fn uploaded_file_path(&self, filename: &str) -> Option<PathBuf> {
        let cfg = self.config.upload().ok()?;
        Some(join_stored(&normalize_path(&cfg.directory), filename))
    }

    /// Web path of a stored file: final directory segment, then the name.
    pub fn uploaded_file_url(&self, filename: &str) -> Option<String> {
        let cfg = self.config.upload().ok()?;
        let dir = normalize_path(&cfg.directory);
        let folder = dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Some(format!("{}/{}", folder, filename))
    }

    pub fn uploaded_file_size(&self, filename: &str) -> String {
        match self.uploaded_file_path(filename) {
            Some(path) => human_file_size(path),
            None => format_bytes(0),
        }
    }

    fn staged_set(&self) -> std::sync::MutexGuard<'_, HashSet<PathBuf>> {
        match self.staged.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Remove a file. False when it does not exist or removal fails.
pub fn delete_path(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    if !path.exists() {
        return false;
    }
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "delete failed");
            false
        }
    }
}

/// Case-insensitive membership of the extension of `filename`.
pub fn check_extension(filename: &str, allowed_extensions: &[String]) -> bool {
    contains_extension(allowed_extensions, &extension_of(filename))
}

/// Size of the file at `path` for display, "0 bytes" when it cannot be read.
pub fn human_file_size(path: impl AsRef<Path>) -> String {
    match fs::metadata(path) {
        Ok(meta) => format_bytes(meta.len()),
        Err(_) => format_bytes(0),
    }
}

/// Keep only `[A-Za-z0-9._-]`, at most 255 characters.
pub fn safe_filename(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .take(MAX_FILENAME_LEN)
        .collect()
}

fn contains_extension(allowed: &[String], ext: &str) -> bool {
    allowed.iter().any(|a| a.eq_ignore_ascii_case(ext))
}

fn unique_name(original: &str, ext: &str) -> String {
    let base = safe_filename(stem_of(original));
    let base = if base.is_empty() { FALLBACK_BASE } else { base.as_str() };
    let token = uuid::Uuid::new_v4().simple();
    if ext.is_empty() {
        format!("{}_{}", base, token)
    } else {
        format!("{}_{}.{}", base, token, ext)
    }
}

/// Drop trailing separators. The root directory is kept as is.
fn normalize_path(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    let trimmed = s.trim_end_matches(|c: char| c == '/' || c == '\\');
    if trimmed.is_empty() {
        path.to_path_buf()
    } else {
        PathBuf::from(trimmed)
    }
}

/// Stored names are appended to the directory, never resolved as absolute paths.
fn join_stored(dir: &Path, filename: &str) -> PathBuf {
    PathBuf::from(format!("{}{}{}", dir.display(), MAIN_SEPARATOR, filename))
}

fn create_dir_all(dir: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    builder.create(dir)
}

fn is_writable(dir: &Path) -> bool {
    fs::metadata(dir)
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false)
}

/// Rename, falling back to copy and remove across filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
    }
}
