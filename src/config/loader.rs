//! Settings loading from disk and the environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::AppSettings;
use crate::config::validation::{validate_settings, ValidationError};

/// Error type for settings loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides, and validate.
///
/// A missing file is not an error; defaults are used instead.
pub fn load_settings(path: &Path) -> Result<AppSettings, ConfigError> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// [`load_settings`] with an injectable environment lookup.
pub fn load_settings_with<F>(path: &Path, lookup: F) -> Result<AppSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = read_file(path)?;
    apply_env_overrides(&mut settings, lookup);
    validate_settings(&settings).map_err(ConfigError::Validation)?;
    Ok(settings)
}

/// Parse the TOML file only; no overrides, no validation.
pub fn read_file(path: &Path) -> Result<AppSettings, ConfigError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppSettings::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Where [`read_file`] takes its base settings from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsOrigin {
    File,
    Defaults,
}

/// Reported after logging is up, since loading happens before it.
pub fn settings_origin(path: &Path) -> SettingsOrigin {
    if path.is_file() {
        SettingsOrigin::File
    } else {
        SettingsOrigin::Defaults
    }
}

/// Apply the supported environment variables on top of `settings`.
/// Unset or empty variables leave the current value alone.
pub fn apply_env_overrides<F>(settings: &mut AppSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = get("PORT") {
        let host = settings
            .server
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        settings.server.bind_address = format!("{}:{}", host, port.trim());
    }
    if let Some(level) = get("LOG_LEVEL") {
        settings.observability.log_level = level;
    }
    if let Some(name) = get("SING_BOX_SERVICE_NAME") {
        settings.engine.service_name = name;
    }
    if let Some(path) = get("SING_BOX_BINARY_PATH") {
        settings.engine.binary_path = Some(PathBuf::from(path));
    }
    if let Some(path) = get("SING_BOX_CONFIG_PATH") {
        settings.engine.config_path = PathBuf::from(path);
    }
    if let Some(name) = get("MOSDNS_SERVICE_NAME") {
        settings.dns.service_name = name;
    }
    if let Some(path) = get("MOSDNS_CONFIG_PATH") {
        settings.dns.config_path = PathBuf::from(path);
    }
    if let Some(dir) = get("BACKUP_DIR") {
        settings.backup.dir = PathBuf::from(dir);
    }
    if let Some(dir) = get("WEB_DIR") {
        settings.server.web_dir = PathBuf::from(dir);
    }
    if let Some(timeout) = get("SERVICE_TIMEOUT") {
        match timeout.trim().parse::<u64>() {
            Ok(secs) => settings.engine.command_timeout_secs = secs,
            Err(_) => tracing::warn!(value = %timeout, "Ignoring non-numeric SERVICE_TIMEOUT"),
        }
    }
    if let Some(key) = get("API_KEY") {
        settings.server.api_key = Some(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_with(&dir.path().join("none.toml"), env(&[])).unwrap();
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn test_settings_origin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routectl.toml");
        assert_eq!(settings_origin(&path), SettingsOrigin::Defaults);

        fs::write(&path, "").unwrap();
        assert_eq!(settings_origin(&path), SettingsOrigin::File);
        assert_eq!(settings_origin(dir.path()), SettingsOrigin::Defaults);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routectl.toml");
        fs::write(
            &path,
            "[engine]\nconfig_path = \"/srv/sing-box.json\"\nvalidate_rule_sets = false\n\n[rollback]\nverify_delay_secs = 9\n",
        )
        .unwrap();

        let settings = load_settings_with(&path, env(&[])).unwrap();
        assert_eq!(settings.engine.config_path, PathBuf::from("/srv/sing-box.json"));
        assert!(!settings.engine.validate_rule_sets);
        assert_eq!(settings.engine.service_name, "sing-box");
        assert_eq!(settings.rollback.verify_delay_secs, 9);
        assert_eq!(settings.rollback.flush_delay_secs, 2);
    }

    #[test]
    fn test_env_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routectl.toml");
        fs::write(&path, "[server]\nbind_address = \"127.0.0.1:8080\"\n").unwrap();

        let settings = load_settings_with(
            &path,
            env(&[
                ("PORT", "9999"),
                ("SING_BOX_CONFIG_PATH", "/tmp/sb.json"),
                ("SERVICE_TIMEOUT", "12"),
                ("API_KEY", "s3cret"),
                ("MOSDNS_SERVICE_NAME", ""),
            ]),
        )
        .unwrap();

        assert_eq!(settings.server.bind_address, "127.0.0.1:9999");
        assert_eq!(settings.engine.config_path, PathBuf::from("/tmp/sb.json"));
        assert_eq!(settings.engine.command_timeout_secs, 12);
        assert_eq!(settings.server.api_key.as_deref(), Some("s3cret"));
        assert_eq!(settings.dns.service_name, "mosdns");
    }

    #[test]
    fn test_parse_and_validation_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routectl.toml");

        fs::write(&path, "[server\n").unwrap();
        assert!(matches!(load_settings_with(&path, env(&[])), Err(ConfigError::Parse(_))));

        fs::write(&path, "[observability]\nlog_format = \"xml\"\n").unwrap();
        assert!(matches!(
            load_settings_with(&path, env(&[])),
            Err(ConfigError::Validation(errors)) if errors.len() == 1
        ));
    }
}
