//! Routing rule views.
//!
//! # Data Flow
//! ```text
//! route.rules    → projector.rs (ordered conditions, display text)
//! route.rule_set → rule_sets.rs (normalized list, 1-based ids)
//!     → RulesView { routeRules, ruleSets }
//! ```

pub mod projector;
pub mod rule_sets;

pub use projector::{display_text, project_rule, project_rules, Condition, ProjectedRule};
pub use rule_sets::{list_rule_sets, RuleSetEntry, RulesView};
