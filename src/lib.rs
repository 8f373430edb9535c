//! routectl: management backend for a sing-box / mosdns router.
//!
//! Reads, edits and validates the sing-box JSON document, supervises both
//! services, and serves the JSON API consumed by the web dashboard.

// Configuration document
pub mod classify;
pub mod document;
pub mod mutation;
pub mod rules;
pub mod validator;
pub mod workflow;

// Serving
pub mod api;
pub mod http;
pub mod service;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::AppSettings;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
