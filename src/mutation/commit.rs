//! Commit pipeline.
//!
//! # Responsibilities
//! - Load a fresh candidate from the store for every operation
//! - Run exactly one validator call per validated commit attempt
//! - Write only accepted candidates, optionally taking a backup first
//!
//! # Design Decisions
//! - The engine holds no document between calls; the store owns the file
//! - Rule-set writes consult a settings switch for validation

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::document::{ConfigStore, Document, StoreError};
use crate::mutation::error::MutationError;
use crate::observability::metrics;
use crate::validator::{ConfigValidator, ValidatorError};

/// Unified error for the commit pipeline.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Validator(#[from] ValidatorError),
}

/// Whether a write must pass the external validator first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Validated,
    Unvalidated,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    pub backup_before_write: bool,
    pub validate_rule_sets: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            backup_before_write: false,
            validate_rule_sets: true,
        }
    }
}

/// What a successful commit did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    pub backup: Option<PathBuf>,
    pub validated: bool,
}

pub struct ConfigEngine {
    store: ConfigStore,
    validator: Arc<dyn ConfigValidator>,
    options: EngineOptions,
}

impl ConfigEngine {
    pub fn new(store: ConfigStore, validator: Arc<dyn ConfigValidator>, options: EngineOptions) -> Self {
        Self {
            store,
            validator,
            options,
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn options(&self) -> EngineOptions {
        self.options
    }

    /// Gate applied to rule-set writes.
    pub fn rule_set_gate(&self) -> Gate {
        if self.options.validate_rule_sets {
            Gate::Validated
        } else {
            Gate::Unvalidated
        }
    }

    pub fn load(&self) -> Result<Document, EngineError> {
        Ok(self.store.read_document()?)
    }

    /// Validate (when gated) and write `candidate`. A rejection leaves the
    /// file untouched.
    pub async fn commit(&self, candidate: &Document, gate: Gate) -> Result<CommitReceipt, EngineError> {
        let validated = match gate {
            Gate::Validated => {
                self.check(&candidate.to_value()).await?;
                true
            }
            Gate::Unvalidated => false,
        };

        let backup = if self.options.backup_before_write {
            Some(self.store.backup()?)
        } else {
            None
        };

        self.store.write(candidate)?;
        tracing::info!(
            path = %self.store.path().display(),
            validated,
            backup = ?backup,
            "Configuration committed"
        );
        Ok(CommitReceipt { backup, validated })
    }

    /// Load, apply `edit`, then commit. `T` is whatever the edit reports.
    pub async fn mutate<T, F>(&self, op: &'static str, gate: Gate, edit: F) -> Result<(T, CommitReceipt), EngineError>
    where
        F: FnOnce(&mut Document) -> Result<T, MutationError> + Send,
        T: Send,
    {
        let result = self.mutate_inner(gate, edit).await;
        let outcome = match &result {
            Ok(_) => "committed",
            Err(EngineError::Mutation(_)) => "invalid",
            Err(EngineError::Validator(ValidatorError::Rejected { .. })) => "rejected",
            Err(_) => "error",
        };
        metrics::record_mutation(op, outcome);
        if let Err(e) = &result {
            tracing::warn!(op, outcome, error = %e, "Mutation not committed");
        }
        result
    }

    async fn mutate_inner<T, F>(&self, gate: Gate, edit: F) -> Result<(T, CommitReceipt), EngineError>
    where
        F: FnOnce(&mut Document) -> Result<T, MutationError> + Send,
        T: Send,
    {
        let mut candidate = self.load()?;
        let value = edit(&mut candidate)?;
        let receipt = self.commit(&candidate, gate).await?;
        Ok((value, receipt))
    }

    /// Apply `edit` to a fresh candidate and validate it without writing.
    pub async fn preview<T, F>(&self, edit: F) -> Result<T, EngineError>
    where
        F: FnOnce(&mut Document) -> Result<T, MutationError> + Send,
        T: Send,
    {
        let mut candidate = self.load()?;
        let value = edit(&mut candidate)?;
        self.check(&candidate.to_value()).await?;
        Ok(value)
    }

    /// Validate an arbitrary configuration supplied by a client.
    pub async fn validate_value(&self, candidate: &Value) -> Result<(), EngineError> {
        self.check(candidate).await
    }

    /// Validate the file currently on disk.
    pub async fn validate_current(&self) -> Result<(), EngineError> {
        let path = self.store.path();
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()).into());
        }
        let result = self.validator.validate_file(path).await;
        record_check(&result);
        Ok(result?)
    }

    async fn check(&self, candidate: &Value) -> Result<(), EngineError> {
        let result = self.validator.validate(candidate).await;
        record_check(&result);
        Ok(result?)
    }
}

fn record_check(result: &Result<(), ValidatorError>) {
    let outcome = match result {
        Ok(()) => "accepted",
        Err(ValidatorError::Rejected { .. }) => "rejected",
        Err(ValidatorError::Unavailable { .. }) => "unavailable",
        Err(_) => "error",
    };
    metrics::record_validation(outcome);
}
