//! Checker binary discovery.
//!
//! # Responsibilities
//! - Find the engine binary through supervisor introspection first
//! - Fall back to configured path, common install paths, then `PATH`
//! - Record every probe so failures can list what was tried
//!
//! # Design Decisions
//! - Parsing helpers are pure; only [`BinaryLocator`] touches the system
//! - A successful hit is cached and re-checked on use

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::Serialize;

use crate::service::process::ProcessRunner;
use crate::validator::gateway::ValidatorError;

/// Where a binary path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryMethod {
    SystemdProperty,
    SystemdShow,
    SystemdCat,
    UnitFile,
    RunningProcess,
    Configured,
    CommonPath,
    SearchPath,
}

impl fmt::Display for DiscoveryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DiscoveryMethod::SystemdProperty => "systemctl show --property=ExecStart",
            DiscoveryMethod::SystemdShow => "systemctl show",
            DiscoveryMethod::SystemdCat => "systemctl cat",
            DiscoveryMethod::UnitFile => "unit file",
            DiscoveryMethod::RunningProcess => "running process",
            DiscoveryMethod::Configured => "configured path",
            DiscoveryMethod::CommonPath => "common path",
            DiscoveryMethod::SearchPath => "PATH",
        };
        f.write_str(text)
    }
}

/// One probe and its result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub method: DiscoveryMethod,
    pub location: String,
    pub found: bool,
}

/// Outcome of a full discovery pass.
#[derive(Debug, Clone, Serialize)]
pub struct Discovery {
    pub path: Option<PathBuf>,
    pub method: Option<DiscoveryMethod>,
    pub attempts: Vec<Attempt>,
}

impl Discovery {
    /// Every location probed, for error messages.
    pub fn probed(&self) -> Vec<String> {
        self.attempts
            .iter()
            .map(|a| format!("{}: {}", a.method, a.location))
            .collect()
    }
}

/// Inputs to discovery.
#[derive(Debug, Clone)]
pub struct LocatorSettings {
    pub service_name: String,
    pub binary_name: String,
    pub configured_path: Option<PathBuf>,
    pub unit_dirs: Vec<PathBuf>,
    pub common_paths: Vec<PathBuf>,
    pub search_path: Option<OsString>,
}

impl LocatorSettings {
    pub fn for_service(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            binary_name: "sing-box".to_string(),
            configured_path: None,
            unit_dirs: [
                "/etc/systemd/system",
                "/usr/lib/systemd/system",
                "/lib/systemd/system",
                "/run/systemd/system",
                "/etc/systemd/system/multi-user.target.wants",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
            common_paths: [
                "/usr/local/bin/sing-box",
                "/usr/bin/sing-box",
                "/opt/sing-box/sing-box",
                "/etc/sing-box/sing-box",
                "./sing-box",
            ]
            .into_iter()
            .map(PathBuf::from)
            .collect(),
            search_path: std::env::var_os("PATH"),
        }
    }
}

/// Locates the checker binary and caches the result.
pub struct BinaryLocator {
    settings: LocatorSettings,
    runner: Arc<dyn ProcessRunner>,
    cached: ArcSwapOption<PathBuf>,
}

impl BinaryLocator {
    pub fn new(settings: LocatorSettings, runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            settings,
            runner,
            cached: ArcSwapOption::empty(),
        }
    }

    pub fn settings(&self) -> &LocatorSettings {
        &self.settings
    }

    /// Cached path if still executable, otherwise a fresh discovery.
    pub async fn resolve(&self) -> Result<PathBuf, ValidatorError> {
        if let Some(path) = self.cached.load_full() {
            if is_executable(&path) {
                return Ok(path.as_ref().clone());
            }
            self.cached.store(None);
        }

        let discovery = self.discover().await;
        match (discovery.path.clone(), discovery.method) {
            (Some(path), Some(method)) => {
                tracing::info!(path = %path.display(), method = %method, "Checker binary located");
                self.cached.store(Some(Arc::new(path.clone())));
                Ok(path)
            }
            _ => {
                tracing::error!(attempts = discovery.attempts.len(), "Checker binary not found");
                Err(ValidatorError::Unavailable {
                    probed: discovery.probed(),
                })
            }
        }
    }

    /// Run every strategy in order until one yields an executable file.
    pub async fn discover(&self) -> Discovery {
        let mut attempts = Vec::new();
        let found = self.probe_all(&mut attempts).await;
        let (path, method) = match found {
            Some((path, method)) => (Some(path), Some(method)),
            None => (None, None),
        };
        Discovery {
            path,
            method,
            attempts,
        }
    }

    async fn probe_all(&self, attempts: &mut Vec<Attempt>) -> Option<(PathBuf, DiscoveryMethod)> {
        let service = self.settings.service_name.as_str();

        let property = self
            .capture(&["show", service, "--property=ExecStart", "--value"])
            .await;
        if let Some(hit) = record(
            attempts,
            DiscoveryMethod::SystemdProperty,
            format!("systemctl show {} --property=ExecStart", service),
            property.and_then(|out| first_executable(exec_start_candidates(&out))),
        ) {
            return Some(hit);
        }

        let show = self.capture(&["show", service]).await;
        if let Some(hit) = record(
            attempts,
            DiscoveryMethod::SystemdShow,
            format!("systemctl show {}", service),
            show.and_then(|out| first_executable(parse_unit_content(&out))),
        ) {
            return Some(hit);
        }

        let cat = self.capture(&["cat", service]).await;
        if let Some(hit) = record(
            attempts,
            DiscoveryMethod::SystemdCat,
            format!("systemctl cat {}", service),
            cat.and_then(|out| first_executable(parse_unit_content(&out))),
        ) {
            return Some(hit);
        }

        for dir in &self.settings.unit_dirs {
            let unit = dir.join(format!("{}.service", service));
            let hit = std::fs::read_to_string(&unit)
                .ok()
                .and_then(|content| first_executable(parse_unit_content(&content)));
            if let Some(hit) = record(attempts, DiscoveryMethod::UnitFile, unit.display().to_string(), hit) {
                return Some(hit);
            }
        }

        let process = self.from_running_process().await;
        if let Some(hit) = record(
            attempts,
            DiscoveryMethod::RunningProcess,
            format!("pgrep -f {}", self.settings.binary_name),
            process,
        ) {
            return Some(hit);
        }

        if let Some(configured) = &self.settings.configured_path {
            let hit = is_executable(configured).then(|| configured.clone());
            if let Some(hit) = record(
                attempts,
                DiscoveryMethod::Configured,
                configured.display().to_string(),
                hit,
            ) {
                return Some(hit);
            }
        }

        for candidate in &self.settings.common_paths {
            let hit = is_executable(candidate).then(|| candidate.clone());
            if let Some(hit) = record(
                attempts,
                DiscoveryMethod::CommonPath,
                candidate.display().to_string(),
                hit,
            ) {
                return Some(hit);
            }
        }

        let hit = self
            .settings
            .search_path
            .as_ref()
            .and_then(|paths| search_path(paths, &self.settings.binary_name));
        record(
            attempts,
            DiscoveryMethod::SearchPath,
            format!("$PATH/{}", self.settings.binary_name),
            hit,
        )
    }

    async fn capture(&self, args: &[&str]) -> Option<String> {
        match self.runner.run("systemctl", args).await {
            Ok(output) => output.stdout_if_ok().map(str::to_string),
            Err(e) => {
                tracing::debug!(error = %e, "systemctl unavailable for discovery");
                None
            }
        }
    }

    /// Only processes whose executable is named like the checker count;
    /// `pgrep -f` also matches shells and log tails mentioning the name.
    async fn from_running_process(&self) -> Option<PathBuf> {
        let binary_name = self.settings.binary_name.as_str();
        let output = self.runner.run("pgrep", &["-f", binary_name]).await.ok()?;
        let own_pid = std::process::id().to_string();

        for pid in output.stdout.lines().map(str::trim).filter(|p| !p.is_empty()) {
            if pid == own_pid {
                continue;
            }
            if let Ok(exe) = std::fs::read_link(format!("/proc/{}/exe", pid)) {
                if names_binary(&exe, binary_name) && is_executable(&exe) {
                    return Some(exe);
                }
            }
            if let Ok(ps) = self.runner.run("ps", &["-p", pid, "-o", "cmd", "--no-headers"]).await {
                let hit = ps.stdout_if_ok().and_then(|cmd| {
                    let named = exec_start_candidates(cmd)
                        .into_iter()
                        .filter(|c| names_binary(Path::new(c), binary_name))
                        .collect();
                    first_executable(named)
                });
                if hit.is_some() {
                    return hit;
                }
            }
        }
        None
    }
}

fn names_binary(path: &Path, binary_name: &str) -> bool {
    path.file_name().and_then(|name| name.to_str()) == Some(binary_name)
}

fn record(
    attempts: &mut Vec<Attempt>,
    method: DiscoveryMethod,
    location: String,
    hit: Option<PathBuf>,
) -> Option<(PathBuf, DiscoveryMethod)> {
    attempts.push(Attempt {
        method,
        location,
        found: hit.is_some(),
    });
    hit.map(|path| (path, method))
}

fn first_executable(candidates: Vec<String>) -> Option<PathBuf> {
    candidates
        .into_iter()
        .map(PathBuf::from)
        .find(|path| is_executable(path))
}

/// Candidate binary paths from an `ExecStart` value.
///
/// Accepts a plain command line (`/usr/bin/sing-box run -c x`), the
/// structured form `systemctl show` prints
/// (`{ path=/usr/bin/sing-box ; argv[]=/usr/bin/sing-box run ; ... }`),
/// and the `@` and `-` prefixes systemd allows.
pub fn exec_start_candidates(value: &str) -> Vec<String> {
    let value = value.trim();
    let mut candidates = Vec::new();

    for token in value.split_whitespace() {
        for prefix in ["path=", "argv[]="] {
            if let Some(rest) = token.strip_prefix(prefix) {
                let rest = rest.trim_end_matches(';');
                if let Some(path) = clean_command(rest) {
                    candidates.push(path);
                }
            }
        }
    }
    if let Some(path) = clean_command(value) {
        candidates.push(path);
    }
    candidates.dedup();
    candidates
}

fn clean_command(command: &str) -> Option<String> {
    let command = command.trim().trim_start_matches("path=");
    let command = command.trim_matches(|c| c == '"' || c == '\'');
    let command = command.trim_start_matches(['@', '-', '+', '!', ':']);
    let first = command.split_whitespace().next()?;
    let first = first.trim_matches(|c| c == '"' || c == '\'');
    (first.starts_with('/') || first.starts_with('.')).then(|| first.to_string())
}

/// Candidates from every `ExecStart=` line of unit text or `systemctl show`
/// output.
pub fn parse_unit_content(content: &str) -> Vec<String> {
    content
        .lines()
        .filter_map(|line| line.trim().strip_prefix("ExecStart="))
        .flat_map(exec_start_candidates)
        .collect()
}

fn search_path(paths: &OsString, binary: &str) -> Option<PathBuf> {
    std::env::split_paths(paths)
        .map(|dir| dir.join(binary))
        .find(|candidate| is_executable(candidate))
}

/// Regular file with at least one execute bit.
pub fn is_executable(path: &Path) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => has_exec_bit(&meta),
        _ => false,
    }
}

#[cfg(unix)]
fn has_exec_bit(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_exec_bit(_meta: &std::fs::Metadata) -> bool {
    true
}
