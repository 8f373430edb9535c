//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, static dashboard)
//!     → request.rs (assign/propagate request ID)
//!     → api/ (auth, handlers)
//!     → response.rs (envelope, error → status mapping)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, RequestIdExt, RequestIdLayer, X_REQUEST_ID};
pub use response::{ApiError, ApiJson, ApiResponse};
pub use server::{AppState, HttpServer};
