//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject empty service names and unknown log formats
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppSettings → Result<(), Vec<ValidationError>>
//! - Runs before settings are accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::AppSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_settings(settings: &AppSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if settings.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("`{}` is not a socket address", settings.server.bind_address),
        ));
    }
    if settings.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }
    if settings.server.max_body_bytes == 0 {
        errors.push(ValidationError::new("server.max_body_bytes", "must be greater than 0"));
    }
    if settings.server.api_key.as_deref().is_some_and(|k| k.trim().is_empty()) {
        errors.push(ValidationError::new("server.api_key", "must not be blank when set"));
    }

    if settings.engine.service_name.trim().is_empty() {
        errors.push(ValidationError::new("engine.service_name", "must not be empty"));
    }
    if settings.engine.command_timeout_secs == 0 {
        errors.push(ValidationError::new("engine.command_timeout_secs", "must be greater than 0"));
    }
    if settings.engine.config_path.as_os_str().is_empty() {
        errors.push(ValidationError::new("engine.config_path", "must not be empty"));
    }

    if settings.dns.service_name.trim().is_empty() {
        errors.push(ValidationError::new("dns.service_name", "must not be empty"));
    }

    let observability = &settings.observability;
    if !matches!(observability.log_format.as_str(), "pretty" | "json") {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format `{}` (expected pretty or json)", observability.log_format),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_settings(&AppSettings::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_error() {
        let mut settings = AppSettings::default();
        settings.server.bind_address = "nowhere".into();
        settings.server.request_timeout_secs = 0;
        settings.engine.service_name = " ".into();
        settings.engine.command_timeout_secs = 0;
        settings.observability.log_format = "xml".into();

        let errors = validate_settings(&settings).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            [
                "server.bind_address",
                "server.request_timeout_secs",
                "engine.service_name",
                "engine.command_timeout_secs",
                "observability.log_format",
            ]
        );
    }
}
