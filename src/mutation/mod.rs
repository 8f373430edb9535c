//! Mutation engine.
//!
//! # Data Flow
//! ```text
//! request body
//!     → ConfigEngine::mutate (commit.rs)
//!         → ConfigStore::read_document (fresh candidate)
//!         → outbounds.rs / route_rules.rs / rule_sets.rs (edit in memory)
//!         → ConfigValidator::validate (once, when gated)
//!         → [backup] → ConfigStore::write
//! ```
//!
//! # Design Decisions
//! - Edits are pure functions over `&mut Document` and report errors
//!   before touching anything
//! - Three identity schemes: tag (outbound create/update), 1-based
//!   position (outbound delete, route rules), 0-based index (rule sets)

pub mod commit;
pub mod error;
pub mod outbounds;
pub mod route_rules;
pub mod rule_sets;

pub use commit::{CommitReceipt, ConfigEngine, EngineError, EngineOptions, Gate};
pub use error::{Entity, MutationError};
pub use outbounds::{apply_changes, ChangeBatch, ChangeKind, OutboundChange};
pub use route_rules::{MoveDirection, MoveOutcome, ReorderRequest, RuleId};
