//! On-disk configuration store.
//!
//! # Responsibilities
//! - Resolve the configuration path once at startup
//! - Read the file in loose (tree) or strict (typed) mode
//! - Write candidates atomically (temp file in the same directory + rename)
//! - Take timestamped sibling backups and restore from them

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::document::model::EngineConfig;
use crate::document::tree::{Document, DocumentError};

/// Errors raised by the configuration store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl StoreError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Picks the configuration file among a primary path and fallbacks.
pub struct PathResolver {
    primary: PathBuf,
    fallbacks: Vec<PathBuf>,
}

impl PathResolver {
    pub fn new(primary: impl Into<PathBuf>, fallbacks: Vec<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            fallbacks,
        }
    }

    /// First existing candidate wins; when nothing exists the primary path
    /// is returned so that a later write creates it there.
    pub fn locate(&self) -> PathBuf {
        std::iter::once(&self.primary)
            .chain(self.fallbacks.iter())
            .find(|candidate| candidate.is_file())
            .cloned()
            .unwrap_or_else(|| self.primary.clone())
    }
}

/// Owner of the engine configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loose read: the whole file as a JSON tree.
    pub fn read_loose(&self) -> Result<Value, StoreError> {
        let bytes = fs::read(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn read_document(&self) -> Result<Document, StoreError> {
        Ok(Document::from_value(self.read_loose()?)?)
    }

    /// Strict read: only the typed sections survive.
    pub fn read_typed(&self) -> Result<EngineConfig, StoreError> {
        let bytes = fs::read(&self.path).map_err(|e| StoreError::io(&self.path, e))?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn write(&self, document: &Document) -> Result<(), StoreError> {
        self.write_value(&document.to_value())
    }

    /// Serialize with two-space indentation and replace the file atomically.
    pub fn write_value(&self, value: &Value) -> Result<(), StoreError> {
        let text = serde_json::to_string_pretty(value)?;
        write_atomic(&self.path, text.as_bytes())?;
        tracing::info!(path = %self.path.display(), bytes = text.len(), "Configuration written");
        Ok(())
    }

    /// Copy the current file to `<file>.backup.<timestamp>`. Backups taken
    /// within the same second get a numeric suffix so each path is distinct.
    pub fn backup(&self) -> Result<PathBuf, StoreError> {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        let base = format!("{}.backup.{}", self.path.display(), stamp);

        let mut candidate = PathBuf::from(&base);
        let mut counter = 1;
        while candidate.exists() {
            candidate = PathBuf::from(format!("{}.{}", base, counter));
            counter += 1;
        }

        fs::copy(&self.path, &candidate).map_err(|e| StoreError::io(&self.path, e))?;
        tracing::info!(
            path = %self.path.display(),
            backup = %candidate.display(),
            "Configuration backed up"
        );
        Ok(candidate)
    }

    /// Overwrite the configuration with a backup's bytes.
    ///
    /// Returns `Ok(false)` without touching anything when `backup` is empty
    /// or does not exist.
    pub fn restore(&self, backup: &Path) -> Result<bool, StoreError> {
        if backup.as_os_str().is_empty() || !backup.is_file() {
            tracing::warn!(backup = %backup.display(), "No backup to restore, skipping");
            return Ok(false);
        }

        let bytes = fs::read(backup).map_err(|e| StoreError::io(backup, e))?;
        write_atomic(&self.path, &bytes)?;
        tracing::warn!(
            path = %self.path.display(),
            backup = %backup.display(),
            "Configuration restored from backup"
        );
        Ok(true)
    }
}

/// Write `bytes` to a temp file next to `path`, then rename over it.
/// Existing permissions are carried over to the new file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| StoreError::io(&parent, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| StoreError::io(&parent, e))?;
    temp.write_all(bytes).map_err(|e| StoreError::io(temp.path(), e))?;
    temp.as_file()
        .sync_all()
        .map_err(|e| StoreError::io(temp.path(), e))?;

    match fs::metadata(path) {
        Ok(meta) => {
            fs::set_permissions(temp.path(), meta.permissions())
                .map_err(|e| StoreError::io(temp.path(), e))?;
        }
        Err(_) => set_default_permissions(temp.path())?,
    }

    temp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}

#[cfg(unix)]
fn set_default_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644)).map_err(|e| StoreError::io(path, e))
}

#[cfg(not(unix))]
fn set_default_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store_with(dir: &tempfile::TempDir, value: &Value) -> ConfigStore {
        let path = dir.path().join("config.json");
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        ConfigStore::new(path)
    }

    #[test]
    fn test_locate_prefers_first_existing() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("missing.json");
        let second = dir.path().join("second.json");
        let third = dir.path().join("third.json");
        fs::write(&third, "{}").unwrap();

        let resolver = PathResolver::new(&primary, vec![second.clone(), third.clone()]);
        assert_eq!(resolver.locate(), third);

        fs::write(&second, "{}").unwrap();
        assert_eq!(resolver.locate(), second);
    }

    #[test]
    fn test_locate_defaults_to_primary() {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("config.json");
        let resolver = PathResolver::new(&primary, vec![dir.path().join("other.json")]);
        assert_eq!(resolver.locate(), primary);
    }

    #[test]
    fn test_write_keeps_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let original = json!({
            "dns": {"servers": [{"tag": "local", "address": "223.5.5.5"}]},
            "outbounds": [{"tag": "direct", "type": "direct"}],
            "x_custom": {"nested": [1, 2, 3]}
        });
        let store = store_with(&dir, &original);

        let doc = store.read_document().unwrap();
        store.write(&doc).unwrap();

        let text = fs::read_to_string(store.path()).unwrap();
        assert_eq!(text, serde_json::to_string_pretty(&original).unwrap());
        assert!(text.contains("\n  \"dns\""));
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nope.json"));
        assert!(matches!(store.read_loose(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_read_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        let store = ConfigStore::new(path);
        assert!(matches!(store.read_loose(), Err(StoreError::Parse { .. })));
    }

    #[test]
    fn test_strict_read_drops_unknown_sections() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(
            &dir,
            &json!({
                "log": {"level": "warn"},
                "inbounds": [{"tag": "mixed-in", "type": "mixed", "listen": "::", "listen_port": 7890}]
            }),
        );
        let typed = store.read_typed().unwrap();
        assert_eq!(typed.inbounds.len(), 1);
        assert_eq!(typed.inbounds[0].tag, "mixed-in");
    }

    #[test]
    fn test_backups_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, &json!({"outbounds": []}));

        let first = store.backup().unwrap();
        let second = store.backup().unwrap();
        assert_ne!(first, second);
        assert_eq!(fs::read(&first).unwrap(), fs::read(store.path()).unwrap());
        assert!(first
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("config.json.backup."));
    }

    #[test]
    fn test_restore_from_backup() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, &json!({"version": 1}));
        let backup = store.backup().unwrap();

        store.write_value(&json!({"version": 2})).unwrap();
        assert!(store.restore(&backup).unwrap());
        assert_eq!(store.read_loose().unwrap()["version"], 1);
    }

    #[test]
    fn test_restore_without_backup_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with(&dir, &json!({"version": 2}));

        assert!(!store.restore(Path::new("")).unwrap());
        assert!(!store.restore(&dir.path().join("gone")).unwrap());
        assert_eq!(store.read_loose().unwrap()["version"], 2);
    }
}
