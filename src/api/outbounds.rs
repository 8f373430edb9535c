//! Inbound listing and outbound node management.

use axum::extract::{Path, State};
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::committed;
use crate::api::config::VALIDATION_METHOD;
use crate::classify::{group_outbounds, NodeGroup};
use crate::document::{Inbound, Outbound};
use crate::http::{ApiError, ApiJson, ApiResponse, AppState};
use crate::mutation::outbounds::{create_outbound, delete_outbound, update_outbound};
use crate::mutation::{apply_changes, ChangeBatch, Gate};

#[derive(Debug, Serialize)]
pub struct InboundView {
    pub id: usize,
    pub tag: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub listen: Option<String>,
    pub listen_port: Option<u16>,
    pub protocol: String,
    pub enabled: bool,
}

impl InboundView {
    fn new(position: usize, inbound: Inbound) -> Self {
        Self {
            id: position + 1,
            protocol: inbound.protocol_label().to_string(),
            tag: inbound.tag,
            kind: inbound.kind,
            listen: inbound.listen,
            listen_port: inbound.listen_port,
            enabled: true,
        }
    }
}

pub async fn list_inbounds(State(state): State<AppState>) -> Result<ApiResponse<Vec<InboundView>>, ApiError> {
    let config = state.engine.store().read_typed()?;
    let inbounds = config
        .inbounds
        .into_iter()
        .enumerate()
        .map(|(i, inbound)| InboundView::new(i, inbound))
        .collect();
    Ok(ApiResponse::ok(inbounds))
}

pub async fn list_outbounds(State(state): State<AppState>) -> Result<ApiResponse<Vec<NodeGroup>>, ApiError> {
    let document = state.engine.load()?;
    Ok(ApiResponse::ok(group_outbounds(document.outbounds()?)))
}

fn decode(body: Value) -> Result<Outbound, ApiError> {
    Outbound::from_request(body).map_err(|e| ApiError::bad_request(format!("invalid node data: {}", e)))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Value>,
) -> Result<ApiResponse<Value>, ApiError> {
    let outbound = decode(body)?;
    let tag = outbound.tag.clone();
    let ((), receipt) = state
        .engine
        .mutate("outbound.create", Gate::Validated, |doc| create_outbound(doc, outbound))
        .await?;
    tracing::info!(tag = %tag, "Outbound created");
    Ok(committed("node created", &receipt, json!({})))
}

/// The stored node is chosen by the body's `tag`; the path segment is kept
/// for the UI's URL scheme only.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> Result<ApiResponse<Value>, ApiError> {
    let outbound = decode(body)?;
    let tag = outbound.tag.clone();
    let ((), receipt) = state
        .engine
        .mutate("outbound.update", Gate::Validated, |doc| update_outbound(doc, outbound))
        .await?;
    tracing::info!(tag = %tag, path_id = %id, "Outbound updated");
    Ok(committed("node updated", &receipt, json!({})))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    let position: i64 = id
        .trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid node id: {}", id)))?;
    let (removed, receipt) = state
        .engine
        .mutate("outbound.delete", Gate::Validated, |doc| delete_outbound(doc, position))
        .await?;
    tracing::info!(position, tag = ?removed.get("tag"), "Outbound deleted");
    Ok(committed("node deleted", &receipt, json!({})))
}

/// Check a batch against the checker without writing it.
pub async fn validate_changes(
    State(state): State<AppState>,
    ApiJson(batch): ApiJson<ChangeBatch>,
) -> Result<ApiResponse<Value>, ApiError> {
    let count = batch.changes.len();
    state.engine.preview(|doc| apply_changes(doc, &batch.changes)).await?;
    Ok(ApiResponse::with_message(
        "all changes passed validation",
        json!({
            "validation_method": VALIDATION_METHOD,
            "changes_count": count,
        }),
    ))
}

pub async fn batch_save(
    State(state): State<AppState>,
    ApiJson(batch): ApiJson<ChangeBatch>,
) -> Result<ApiResponse<Value>, ApiError> {
    let count = batch.changes.len();
    let ((), receipt) = state
        .engine
        .mutate("outbound.batch", Gate::Validated, |doc| apply_changes(doc, &batch.changes))
        .await?;
    tracing::info!(changes = count, "Outbound batch saved");
    Ok(committed("batch saved", &receipt, json!({ "changes_count": count })))
}
