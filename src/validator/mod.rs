//! External validator gateway.
//!
//! # Data Flow
//! ```text
//! candidate Value
//!     → gateway.rs (stage to temp file)
//!     → discovery.rs (resolve checker binary, cached)
//!     → ProcessRunner: <checker> check -c <file>
//!     → Ok | Rejected(output) | Unavailable(probed)
//! ```
//!
//! # Design Decisions
//! - The gateway is a trait object so tests and the commit engine can swap
//!   in counting fakes
//! - Discovery never fails loudly; it reports every probe instead

pub mod discovery;
pub mod gateway;

pub use discovery::{Attempt, BinaryLocator, Discovery, DiscoveryMethod, LocatorSettings};
pub use gateway::{CheckerValidator, ConfigValidator, ValidatorError};
