//! Engine configuration document subsystem.
//!
//! # Data Flow
//! ```text
//! PathResolver::locate (once, at startup)
//!     → ConfigStore (owns the file)
//!         → read_document() → Document (loose tree, every key kept)
//!         → read_typed()    → EngineConfig (strict, listing only)
//!     → mutation engine edits a Document clone
//!     → ConfigStore::write (temp file + rename)
//! ```
//!
//! # Design Decisions
//! - Loose mode is the only mode that is ever written back
//! - Rule sets are a list in memory and collapsed only when stored
//! - The store never caches; every read goes to disk

pub mod model;
pub mod raw;
pub mod store;
pub mod tree;

pub use model::{EngineConfig, FieldShape, Inbound, OneOrMany, Outbound, RouteRule, RuleSet};
pub use store::{ConfigStore, PathResolver, StoreError};
pub use tree::{Document, DocumentError};
