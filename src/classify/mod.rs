//! Outbound node classification.
//!
//! # Data Flow
//! ```text
//! outbounds (loose tree)
//!     → grouping.rs (drop built-ins, group by declared type)
//!     → classifier.rs (tag heuristics for logical nodes)
//!     → ordered Vec<NodeGroup> for the listing endpoint
//! ```

pub mod classifier;
pub mod grouping;

pub use classifier::{classify, classify_tag, GroupName};
pub use grouping::{group_outbounds, NodeGroup};
