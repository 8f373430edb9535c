//! Raw text access to service configuration files.
//!
//! Used by the `/api/config/{service}` endpoints, which edit a file as
//! opaque text and only apply a light format sanity check.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::document::store::{write_atomic, StoreError};

/// Contents and metadata of a configuration file.
#[derive(Debug, Clone, Serialize)]
pub struct FileSnapshot {
    pub path: String,
    pub content: String,
    pub size: u64,
    #[serde(rename = "last_modified", skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Local>>,
}

impl FileSnapshot {
    pub fn read(path: &Path) -> Result<Self, StoreError> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        let meta = fs::metadata(path).map_err(|e| StoreError::io(path, e))?;
        Ok(Self {
            path: path.display().to_string(),
            content,
            size: meta.len(),
            modified: meta.modified().ok().map(DateTime::<Local>::from),
        })
    }
}

/// Copy `path` into `dir` as `<YYYYmmdd_HHMMSS>_<path with / as _>`.
///
/// Returns `Ok(None)` when the source does not exist yet.
pub fn backup_into(path: &Path, dir: &Path) -> Result<Option<PathBuf>, StoreError> {
    if !path.is_file() {
        return Ok(None);
    }
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let flattened = path.display().to_string().replace('/', "_");
    let target = dir.join(format!("{}_{}", stamp, flattened));

    fs::copy(path, &target).map_err(|e| StoreError::io(path, e))?;
    tracing::info!(source = %path.display(), backup = %target.display(), "File backed up");
    Ok(Some(target))
}

pub fn write_text(path: &Path, content: &str) -> Result<(), StoreError> {
    write_atomic(path, content.as_bytes())?;
    tracing::info!(path = %path.display(), bytes = content.len(), "File written");
    Ok(())
}
