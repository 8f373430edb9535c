//! Mutation errors.

use std::fmt;

use thiserror::Error;

use crate::document::DocumentError;

/// Which keyed collection an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Outbound,
    RuleSet,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entity::Outbound => f.write_str("outbound"),
            Entity::RuleSet => f.write_str("rule set"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MutationError {
    #[error("{entity} with tag `{tag}` already exists")]
    DuplicateTag { entity: Entity, tag: String },

    #[error("{entity} tag must not be blank")]
    BlankTag { entity: Entity },

    #[error("{entity} `{key}` not found")]
    NotFound { entity: Entity, key: String },

    #[error("{entity} index {index} out of range (have {len})")]
    OutOfRange {
        entity: Entity,
        index: i64,
        len: usize,
    },

    #[error("invalid rule id: {0}")]
    InvalidRuleId(String),

    #[error("no route rules configured")]
    NoRules,

    #[error("cannot move rule {from} to position {to}")]
    OutOfBounds { from: usize, to: i64 },

    #[error("reorder lists {actual} ids but there are {expected} rules")]
    CountMismatch { expected: usize, actual: usize },

    #[error("change #{index} is invalid: {reason}")]
    InvalidChange { index: usize, reason: String },

    #[error("malformed {what}: {reason}")]
    Malformed { what: &'static str, reason: String },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl MutationError {
    pub(crate) fn require_tag(entity: Entity, tag: &str) -> Result<(), Self> {
        if tag.trim().is_empty() {
            return Err(MutationError::BlankTag { entity });
        }
        Ok(())
    }

    pub(crate) fn malformed(what: &'static str, err: impl fmt::Display) -> Self {
        MutationError::Malformed {
            what,
            reason: err.to_string(),
        }
    }
}
