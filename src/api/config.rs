//! Whole-configuration endpoints.
//!
//! # Responsibilities
//! - Read and replace the sing-box document (replace may start a restart job)
//! - Report restart job progress
//! - Run the external checker on a supplied or the current configuration
//! - Raw text access to the mosdns and sing-box files

use std::path::PathBuf;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::document::raw::{backup_into, write_text, FileSnapshot};
use crate::document::StoreError;
use crate::http::{ApiError, ApiJson, ApiResponse, AppState};
use crate::mutation::EngineError;
use crate::service::ServiceKind;
use crate::validator::ValidatorError;
use crate::workflow::ReplaceRequest;

pub const VALIDATION_METHOD: &str = "sing-box check";

pub async fn get_singbox_config(State(state): State<AppState>) -> Result<ApiResponse<Value>, ApiError> {
    let value = state.engine.store().read_loose()?;
    Ok(ApiResponse::ok(value))
}

pub async fn put_singbox_config(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ReplaceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.rollback.replace(request, state.restart_timing())?;
    let message = if outcome.restarting {
        "configuration saved, restarting service"
    } else {
        "configuration saved"
    };
    Ok(ApiResponse::with_message(message, outcome))
}

pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let id = Uuid::parse_str(id.trim()).map_err(|_| ApiError::bad_request(format!("invalid job id: {}", id)))?;
    state
        .rollback
        .job(&id)
        .map(ApiResponse::ok)
        .ok_or_else(|| ApiError::not_found(format!("restart job {} not found", id)))
}

#[derive(Debug, Deserialize)]
pub struct ValidateRequest {
    pub config: Value,
}

/// Checker verdict. A rejection is reported as data with status 400 so the
/// UI can show the output inline.
pub async fn validate_config(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ValidateRequest>,
) -> Result<Response, ApiError> {
    match state.engine.validate_value(&request.config).await {
        Ok(()) => Ok(ApiResponse::ok(json!({
            "valid": true,
            "errors": [],
            "warnings": [],
            "message": "configuration passed sing-box check",
            "validation_method": VALIDATION_METHOD,
        }))
        .into_response()),
        Err(EngineError::Validator(ValidatorError::Rejected { output })) => Ok(verdict_failed(json!({
            "valid": false,
            "errors": [output],
            "warnings": [],
            "message": "sing-box check failed",
            "validation_method": VALIDATION_METHOD,
        }))),
        Err(e) => Err(e.into()),
    }
}

pub async fn validate_current(State(state): State<AppState>) -> Result<Response, ApiError> {
    match state.engine.validate_current().await {
        Ok(()) => Ok(ApiResponse::ok(json!({
            "valid": true,
            "message": "current configuration is valid and safe to restart",
            "validation_method": VALIDATION_METHOD,
        }))
        .into_response()),
        Err(EngineError::Validator(ValidatorError::Rejected { output })) => Ok(verdict_failed(json!({
            "valid": false,
            "error": output,
            "message": "current configuration failed validation",
            "validation_method": VALIDATION_METHOD,
        }))),
        Err(e) => Err(e.into()),
    }
}

fn verdict_failed(data: Value) -> Response {
    let body = json!({
        "code": StatusCode::BAD_REQUEST.as_u16(),
        "message": "validation failed",
        "data": data,
    });
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
pub struct RawUpdateRequest {
    pub content: String,
    #[serde(default)]
    pub backup: bool,
}

pub async fn get_raw_config(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let path = raw_path(&state, parse_kind(&service)?);
    if !path.is_file() {
        return Err(StoreError::NotFound(path).into());
    }
    Ok(ApiResponse::ok(FileSnapshot::read(&path)?))
}

pub async fn put_raw_config(
    State(state): State<AppState>,
    Path(service): Path<String>,
    ApiJson(request): ApiJson<RawUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&service)?;
    let path = raw_path(&state, kind);
    check_format(kind, &request.content)
        .map_err(|reason| ApiError::bad_request(format!("invalid configuration format: {}", reason)))?;

    let backup_path = if request.backup {
        let dir = state.settings().backup.dir.clone();
        backup_into(&path, &dir)?
    } else {
        None
    };
    write_text(&path, &request.content)?;

    Ok(ApiResponse::ok(json!({
        "success": true,
        "message": "configuration file updated",
        "backup_path": backup_path,
    })))
}

fn parse_kind(service: &str) -> Result<ServiceKind, ApiError> {
    service
        .parse::<ServiceKind>()
        .map_err(|_| ApiError::bad_request(format!("unsupported service: {}", service)))
}

fn raw_path(state: &AppState, kind: ServiceKind) -> PathBuf {
    match kind {
        ServiceKind::SingBox => state.engine.store().path().to_path_buf(),
        ServiceKind::Mosdns => state.dns_config_path.clone(),
    }
}

/// Light sanity check before a raw save; the service's own loader has the
/// final word.
pub fn check_format(kind: ServiceKind, content: &str) -> Result<(), String> {
    match kind {
        ServiceKind::Mosdns if !content.contains("plugins:") => {
            Err("mosdns configuration has no `plugins:` section".into())
        }
        ServiceKind::Mosdns => Ok(()),
        ServiceKind::SingBox => serde_json::from_str::<Value>(content)
            .map(|_| ())
            .map_err(|e| e.to_string()),
    }
}
