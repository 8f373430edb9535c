//! Service supervisor control.
//!
//! # Responsibilities
//! - Issue `start|stop|restart|reload` to a supervised unit
//! - Report unit status (running, stopped, failed, not installed)
//! - Surface PID and uptime for running units
//!
//! # Design Decisions
//! - All supervisor access goes through [`ServiceControl`], so the rollback
//!   workflow and the HTTP layer never shell out directly
//! - `systemctl` is reached through the shared [`ProcessRunner`]

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime, TimeZone};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::service::process::{ProcessError, ProcessRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
    Reload,
}

impl ServiceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
            ServiceAction::Reload => "reload",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    Running,
    Stopped,
    Failed,
    NotInstalled,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub status: ServiceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,
}

impl ServiceInfo {
    pub fn new(name: impl Into<String>, status: ServiceStatus) -> Self {
        Self {
            name: name.into(),
            status,
            pid: None,
            uptime: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == ServiceStatus::Running
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to {action} {service}: {output}")]
    Command {
        service: String,
        action: ServiceAction,
        output: String,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

#[async_trait]
pub trait ServiceControl: Send + Sync {
    async fn control(&self, service: &str, action: ServiceAction) -> Result<(), ServiceError>;

    async fn status(&self, service: &str) -> Result<ServiceInfo, ServiceError>;
}

/// `systemctl`-backed implementation.
pub struct SystemdControl {
    runner: Arc<dyn ProcessRunner>,
}

impl SystemdControl {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    async fn systemctl(&self, args: &[&str]) -> Option<String> {
        match self.runner.run("systemctl", args).await {
            Ok(output) => Some(output.stdout),
            Err(e) => {
                tracing::debug!(error = %e, ?args, "systemctl probe failed");
                None
            }
        }
    }

    async fn is_installed(&self, service: &str) -> bool {
        let unit = format!("{}.service", service);
        for args in [
            vec!["list-unit-files", unit.as_str(), "--no-legend"],
            vec!["list-units", unit.as_str(), "--all", "--no-legend"],
        ] {
            if let Some(out) = self.systemctl(&args).await {
                if !out.trim().is_empty() {
                    return true;
                }
            }
        }
        false
    }
}

#[async_trait]
impl ServiceControl for SystemdControl {
    async fn control(&self, service: &str, action: ServiceAction) -> Result<(), ServiceError> {
        tracing::info!(service, action = %action, "Service control requested");
        let output = self.runner.run("systemctl", &[action.as_str(), service]).await?;
        if output.success {
            Ok(())
        } else {
            Err(ServiceError::Command {
                service: service.to_string(),
                action,
                output: output.combined().trim().to_string(),
            })
        }
    }

    async fn status(&self, service: &str) -> Result<ServiceInfo, ServiceError> {
        if !self.is_installed(service).await {
            return Ok(ServiceInfo::new(service, ServiceStatus::NotInstalled));
        }

        let state = self
            .systemctl(&["is-active", service])
            .await
            .unwrap_or_default();
        let mut info = ServiceInfo::new(service, parse_active_state(&state));

        if info.is_running() {
            if let Some(out) = self.systemctl(&["show", "-p", "MainPID", service]).await {
                info.pid = parse_property(&out, "MainPID")
                    .and_then(|pid| pid.parse::<u32>().ok())
                    .filter(|pid| *pid > 0);
            }
            if let Some(out) = self
                .systemctl(&["show", "-p", "ActiveEnterTimestamp", service])
                .await
            {
                info.uptime = parse_property(&out, "ActiveEnterTimestamp")
                    .and_then(parse_systemd_timestamp)
                    .map(|started| {
                        let elapsed = Local::now().signed_duration_since(started);
                        format_uptime(elapsed.to_std().unwrap_or_default())
                    });
            }
        }
        Ok(info)
    }
}

/// Map `systemctl is-active` output. An empty answer means the query
/// itself failed.
pub fn parse_active_state(output: &str) -> ServiceStatus {
    match output.trim() {
        "active" | "activating" | "reloading" => ServiceStatus::Running,
        "inactive" | "deactivating" => ServiceStatus::Stopped,
        "failed" | "" => ServiceStatus::Failed,
        _ => ServiceStatus::Unknown,
    }
}

fn parse_property<'a>(output: &'a str, key: &str) -> Option<&'a str> {
    output.lines().find_map(|line| {
        let value = line.trim().strip_prefix(key)?.strip_prefix('=')?;
        let value = value.trim();
        (!value.is_empty()).then_some(value)
    })
}

// systemd prints e.g. `Tue 2026-10-13 08:15:02 UTC`; the zone is local time.
fn parse_systemd_timestamp(text: &str) -> Option<chrono::DateTime<Local>> {
    let mut parts = text.split_whitespace();
    let _weekday = parts.next()?;
    let date = parts.next()?;
    let time = parts.next()?;
    let naive = NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").ok()?;
    Local.from_local_datetime(&naive).single()
}

pub fn format_uptime(elapsed: Duration) -> String {
    let minutes_total = elapsed.as_secs() / 60;
    let days = minutes_total / (24 * 60);
    let hours = (minutes_total / 60) % 24;
    let minutes = minutes_total % 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
