//! Managed services and process execution.
//!
//! # Data Flow
//! ```text
//! HTTP handler / rollback job
//!     → ServiceControl (control.rs, systemd implementation)
//!         → ProcessRunner (process.rs, bounded by timeout)
//!             → systemctl
//! ```

pub mod control;
pub mod process;

use std::fmt;
use std::str::FromStr;

pub use control::{ServiceAction, ServiceControl, ServiceError, ServiceInfo, ServiceStatus, SystemdControl};
pub use process::{CommandOutput, ProcessError, ProcessRunner, SystemRunner};

/// The two services this backend manages, by their API name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Mosdns,
    SingBox,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Mosdns => "mosdns",
            ServiceKind::SingBox => "sing-box",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mosdns" => Ok(ServiceKind::Mosdns),
            "sing-box" | "singbox" => Ok(ServiceKind::SingBox),
            other => Err(format!("unknown service: {}", other)),
        }
    }
}
