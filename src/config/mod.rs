//! Settings management subsystem.
//!
//! # Data Flow
//! ```text
//! settings file (TOML)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → AppSettings (validated, immutable)
//!     → shared via Arc<ArcSwap<_>> to the HTTP layer
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new settings
//!     → validation.rs validates
//!     → atomic swap in the server
//!     → handlers observe new settings on their next request
//! ```
//!
//! # Design Decisions
//! - Settings are immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal files
//! - File paths and service wiring are resolved once at startup; the API
//!   key and restart delays follow reloads

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{
    apply_env_overrides, load_settings, load_settings_with, settings_origin, ConfigError, SettingsOrigin,
};
pub use schema::{
    AppSettings, BackupConfig, DnsConfig, ObservabilityConfig, RollbackConfig, ServerConfig, SingBoxConfig,
};
pub use validation::{validate_settings, ValidationError};
pub use watcher::SettingsWatcher;
