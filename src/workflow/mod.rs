//! Update and rollback workflow.
//!
//! # Data Flow
//! ```text
//! PUT /singbox/config
//!     → [backup] → write → response sent
//!     → background job:
//!         Submitted → Restarting → Verifying → Stable
//!                          │            └──→ RolledBack | Unhealthy
//!                          └──→ RolledBack | Failed
//! ```

pub mod rollback;

pub use rollback::{JobRecord, JobState, ReplaceOutcome, ReplaceRequest, RestartTiming, RollbackCoordinator};
