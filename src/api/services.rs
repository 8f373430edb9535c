//! Service supervision and checker binary detection.

use std::fs;

use axum::extract::{Path, State};
use chrono::{DateTime, Local};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::http::{ApiError, ApiJson, ApiResponse, AppState};
use crate::service::{ServiceAction, ServiceInfo, ServiceKind};

fn lookup(state: &AppState, name: &str) -> Result<String, ApiError> {
    let kind = name
        .parse::<ServiceKind>()
        .map_err(|_| ApiError::not_found(format!("service {} does not exist", name)))?;
    Ok(state.unit_name(kind))
}

pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<Vec<ServiceInfo>>, ApiError> {
    let mut services = Vec::new();
    for kind in [ServiceKind::Mosdns, ServiceKind::SingBox] {
        services.push(state.services.status(&state.unit_name(kind)).await?);
    }
    Ok(ApiResponse::ok(services))
}

pub async fn get(State(state): State<AppState>, Path(name): Path<String>) -> Result<ApiResponse<ServiceInfo>, ApiError> {
    let unit = lookup(&state, &name)?;
    Ok(ApiResponse::ok(state.services.status(&unit).await?))
}

#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    pub action: ServiceAction,
}

pub async fn control(
    State(state): State<AppState>,
    Path(name): Path<String>,
    ApiJson(request): ApiJson<ActionRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let unit = lookup(&state, &name)?;
    state.services.control(&unit, request.action).await?;
    let info = state.services.status(&unit).await?;
    Ok(ApiResponse::ok(json!({
        "success": true,
        "message": format!("{} {} completed", unit, request.action),
        "service_info": info,
    })))
}

pub async fn restart_singbox(State(state): State<AppState>) -> Result<ApiResponse<Value>, ApiError> {
    let unit = state.unit_name(ServiceKind::SingBox);
    state.services.control(&unit, ServiceAction::Restart).await?;
    Ok(ApiResponse::with_message(
        format!("{} restarted", unit),
        json!({ "status": "restarted" }),
    ))
}

/// Run discovery and describe the binary it settles on.
pub async fn detect_path(State(state): State<AppState>) -> Result<ApiResponse<Value>, ApiError> {
    let discovery = state.locator.discover().await;
    let Some(path) = discovery.path.clone() else {
        return Err(ApiError::not_found("sing-box binary not found").with_details(json!({
            "probed": discovery.probed(),
        })));
    };

    let mut data = Map::new();
    data.insert("path".into(), json!(path));
    data.insert("detection_method".into(), json!(discovery.method.map(|m| m.to_string())));
    data.insert("detection_methods".into(), json!(discovery.attempts));
    if let Ok(meta) = fs::metadata(&path) {
        let modified = meta
            .modified()
            .ok()
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string());
        data.insert("file_size".into(), json!(meta.len()));
        data.insert("permissions".into(), json!(permissions(&meta)));
        data.insert("modified_time".into(), json!(modified));
    }
    Ok(ApiResponse::ok(Value::Object(data)))
}

#[cfg(unix)]
fn permissions(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:o}", meta.permissions().mode() & 0o7777)
}

#[cfg(not(unix))]
fn permissions(meta: &fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "readonly".to_string()
    } else {
        "writable".to_string()
    }
}
