//! Request identification.
//!
//! # Responsibilities
//! - Reuse the client's `x-request-id` or mint a UUID v4
//! - Echo the id on the response
//! - Expose the id to handlers and trace spans
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Built on tower-http's set/propagate pair rather than a custom service

use axum::http::{HeaderName, Request};
use tower::Layer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestId, SetRequestId};

pub use tower_http::request_id::RequestId;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Read access to the id assigned by [`RequestIdLayer`].
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers().get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

/// Assigns and propagates `x-request-id`. Install it outermost so every
/// other layer sees the id.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIdLayer;

impl<S> Layer<S> for RequestIdLayer {
    type Service = SetRequestId<PropagateRequestId<S>, MakeRequestUuid>;

    fn layer(&self, inner: S) -> Self::Service {
        let header = HeaderName::from_static(X_REQUEST_ID);
        SetRequestId::new(PropagateRequestId::new(inner, header.clone()), header, MakeRequestUuid)
    }
}
