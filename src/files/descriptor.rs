//! Inbound file description as handed over by the transport.

use std::path::{Path, PathBuf};

/// Transport outcome for one inbound file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferError {
    Ok,
    /// Larger than the server-wide body limit.
    IniSize,
    /// Larger than the form's declared limit.
    FormSize,
    Partial,
    NoFile,
    NoTmpDir,
    CantWrite,
    Extension,
}

/// One inbound file: where the transport left it, what the client called it,
/// how big it claims to be, and whether the transfer itself succeeded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadDescriptor {
    pub tmp_path: PathBuf,
    pub name: String,
    pub size: u64,
    pub error: TransferError,
}

impl UploadDescriptor {
    pub fn new(tmp_path: impl Into<PathBuf>, name: impl Into<String>, size: u64) -> Self {
        UploadDescriptor {
            tmp_path: tmp_path.into(),
            name: name.into(),
            size,
            error: TransferError::Ok,
        }
    }

    /// Descriptor for a transfer that failed before any bytes were staged.
    pub fn failed(name: impl Into<String>, error: TransferError) -> Self {
        UploadDescriptor {
            tmp_path: PathBuf::new(),
            name: name.into(),
            size: 0,
            error,
        }
    }

    /// Lower-cased text after the last dot of the declared name.
    pub fn extension(&self) -> String {
        extension_of(&self.name)
    }
}

/// Lower-cased extension of `name` (without the dot), or empty.
/// A leading-dot name such as `.htaccess` has extension `htaccess`.
pub fn extension_of(name: &str) -> String {
    let base = base_name(name);
    base.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Declared name without directory part and extension.
pub fn stem_of(name: &str) -> &str {
    let base = base_name(name);
    base.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(base)
}

fn base_name(name: &str) -> &str {
    name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name)
}

pub(crate) fn is_within(dir: &Path, path: &Path) -> bool {
    match (dir.canonicalize(), path.canonicalize()) {
        (Ok(dir), Ok(path)) => path.parent() == Some(dir.as_path()),
        _ => false,
    }
}
