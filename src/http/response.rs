//! Response envelopes and error mapping.
//!
//! # Responsibilities
//! - Wrap handler results as `{code, message, data}`
//! - Map domain errors to HTTP status codes
//! - Turn malformed JSON bodies into the same error envelope
//!
//! # Design Decisions
//! - Every API response, success or failure, has the same top-level shape
//! - Checker output and probed paths travel in `details`, never in `message`

use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};

use crate::document::{DocumentError, StoreError};
use crate::mutation::{EngineError, MutationError};
use crate::service::ServiceError;
use crate::validator::ValidatorError;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self::with_message("success", data)
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: message.into(),
            data,
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

/// Failure envelope: `{code, message, details?}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, message = %self.message, "Request failed");
        } else {
            tracing::debug!(status = %self.status, message = %self.message, "Request rejected");
        }

        let mut body = json!({
            "code": self.status.as_u16(),
            "message": self.message,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::not_found(err.to_string()),
            StoreError::Document(_) => ApiError::bad_request(err.to_string()),
            StoreError::Io { .. } | StoreError::Parse { .. } | StoreError::Serialize(_) => {
                ApiError::internal(err.to_string())
            }
        }
    }
}

impl From<DocumentError> for ApiError {
    fn from(err: DocumentError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl From<MutationError> for ApiError {
    fn from(err: MutationError) -> Self {
        match err {
            MutationError::NotFound { .. } | MutationError::OutOfRange { .. } | MutationError::NoRules => {
                ApiError::not_found(err.to_string())
            }
            _ => ApiError::bad_request(err.to_string()),
        }
    }
}

impl From<ValidatorError> for ApiError {
    fn from(err: ValidatorError) -> Self {
        match err {
            ValidatorError::Rejected { output } => ApiError::bad_request("configuration validation failed")
                .with_details(json!({ "output": output })),
            ValidatorError::Unavailable { probed } => ApiError::internal("sing-box binary not found")
                .with_details(json!({ "probed": probed })),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::internal(err.to_string())
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Store(e) => e.into(),
            EngineError::Mutation(e) => e.into(),
            EngineError::Validator(e) => e.into(),
        }
    }
}

/// `Json` extractor whose rejection uses the API error envelope.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(format!("invalid request body: {}", rejection.body_text()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let response = ApiResponse::ok(json!({"count": 2})).into_response();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!({"code": 200, "message": "success", "data": {"count": 2}}));
    }

    #[tokio::test]
    async fn test_rejection_carries_checker_output() {
        let err: ApiError = EngineError::from(ValidatorError::Rejected {
            output: "unknown outbound type".into(),
        })
        .into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let body = body_json(err.into_response()).await;
        assert_eq!(body["code"], 400);
        assert_eq!(body["details"]["output"], "unknown outbound type");
    }

    #[test]
    fn test_status_mapping() {
        let missing: ApiError = StoreError::NotFound(PathBuf::from("/nope")).into();
        assert_eq!(missing.status, StatusCode::NOT_FOUND);

        let no_rules: ApiError = MutationError::NoRules.into();
        assert_eq!(no_rules.status, StatusCode::NOT_FOUND);

        let bad_id: ApiError = MutationError::InvalidRuleId("x".into()).into();
        assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);

        let unavailable: ApiError = ValidatorError::Unavailable { probed: vec![] }.into();
        assert_eq!(unavailable.status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
