use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};

use crate::http::{ApiError, AppState};

/// Bearer-token gate for `/api`. Open when no key is configured; the key
/// is read per request so reloads apply immediately.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let authorized = {
        let settings = state.settings.load();
        match settings.server.api_key.as_deref() {
            None => true,
            Some(key) => request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .is_some_and(|value| value == format!("Bearer {}", key)),
        }
    };

    if authorized {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(path = %request.uri().path(), "Rejected request without valid API key");
        Err(ApiError::unauthorized("missing or invalid API key"))
    }
}
