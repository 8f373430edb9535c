//! External validator gateway.
//!
//! The engine binary is the only authority on whether a configuration is
//! acceptable. A candidate is staged to a temp file and handed to
//! `<checker> check -c <file>`; a non-zero exit rejects it and the tool's
//! output is passed through verbatim.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::service::process::{ProcessError, ProcessRunner};
use crate::validator::discovery::BinaryLocator;

#[derive(Debug, Error)]
pub enum ValidatorError {
    /// The checker ran and rejected the configuration.
    #[error("configuration rejected by checker: {output}")]
    Rejected { output: String },

    /// No usable checker binary.
    #[error("checker binary not found; probed: {}", probed.join(", "))]
    Unavailable { probed: Vec<String> },

    #[error("failed to stage candidate for checking: {0}")]
    Stage(#[from] std::io::Error),

    #[error("failed to serialize candidate: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

#[async_trait]
pub trait ConfigValidator: Send + Sync {
    /// Check an in-memory candidate.
    async fn validate(&self, candidate: &Value) -> Result<(), ValidatorError>;

    /// Check a file already on disk.
    async fn validate_file(&self, path: &Path) -> Result<(), ValidatorError>;
}

/// Runs the discovered engine binary's `check` subcommand.
pub struct CheckerValidator {
    locator: Arc<BinaryLocator>,
    runner: Arc<dyn ProcessRunner>,
}

impl CheckerValidator {
    pub fn new(locator: Arc<BinaryLocator>, runner: Arc<dyn ProcessRunner>) -> Self {
        Self { locator, runner }
    }
}

#[async_trait]
impl ConfigValidator for CheckerValidator {
    async fn validate(&self, candidate: &Value) -> Result<(), ValidatorError> {
        let text = serde_json::to_string_pretty(candidate)?;
        let mut staged = tempfile::Builder::new()
            .prefix("singbox-config-")
            .suffix(".json")
            .tempfile()?;
        staged.write_all(text.as_bytes())?;
        staged.flush()?;

        // `staged` is removed when dropped at the end of this scope.
        self.validate_file(staged.path()).await
    }

    async fn validate_file(&self, path: &Path) -> Result<(), ValidatorError> {
        let binary = self.locator.resolve().await?;
        let binary = binary.to_string_lossy();
        let target = path.to_string_lossy();

        let output = self.runner.run(&binary, &["check", "-c", &target]).await?;
        if output.success {
            tracing::debug!(file = %target, "Checker accepted configuration");
            Ok(())
        } else {
            let combined = output.combined();
            tracing::warn!(file = %target, code = ?output.code, "Checker rejected configuration");
            Err(ValidatorError::Rejected { output: combined })
        }
    }
}
