//! Route rules and the rule-set registry.

use axum::extract::{Path, State};
use serde_json::{json, Value};

use crate::api::committed;
use crate::document::{RouteRule, RuleSet};
use crate::http::{ApiError, ApiJson, ApiResponse, AppState};
use crate::mutation::route_rules::{create_rule, delete_rule, move_rule, reorder_rules, update_rule};
use crate::mutation::rule_sets::{create_rule_set, delete_rule_set, update_rule_set};
use crate::mutation::{Gate, MoveDirection, ReorderRequest, RuleId};
use crate::rules::RulesView;

pub async fn list(State(state): State<AppState>) -> Result<ApiResponse<RulesView>, ApiError> {
    let document = state.engine.load()?;
    let view = RulesView::build(document.route_rules()?, &document.rule_sets()?);
    Ok(ApiResponse::ok(view))
}

fn decode_rule(body: Value) -> Result<RouteRule, ApiError> {
    RouteRule::from_request(body).map_err(|e| ApiError::bad_request(format!("invalid rule: {}", e)))
}

pub async fn create(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Value>,
) -> Result<ApiResponse<Value>, ApiError> {
    let rule = decode_rule(body)?;
    let (count, receipt) = state
        .engine
        .mutate("rule.create", Gate::Validated, |doc| create_rule(doc, rule))
        .await?;
    Ok(committed("route rule created", &receipt, json!({ "rules_count": count })))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> Result<ApiResponse<Value>, ApiError> {
    let rule = decode_rule(body)?;
    let id = RuleId::from(id.as_str());
    let ((), receipt) = state
        .engine
        .mutate("rule.update", Gate::Validated, |doc| update_rule(doc, &id, rule))
        .await?;
    Ok(committed("route rule updated", &receipt, json!({ "id": id.to_string() })))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    let id = RuleId::from(id.as_str());
    let (removed, receipt) = state
        .engine
        .mutate("rule.delete", Gate::Validated, |doc| delete_rule(doc, &id))
        .await?;
    tracing::debug!(rule = %removed, "Route rule removed");
    Ok(committed("route rule deleted", &receipt, json!({})))
}

pub async fn move_up(state: State<AppState>, id: Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    shift(state, id, MoveDirection::Up).await
}

pub async fn move_down(state: State<AppState>, id: Path<String>) -> Result<ApiResponse<Value>, ApiError> {
    shift(state, id, MoveDirection::Down).await
}

async fn shift(
    State(state): State<AppState>,
    Path(id): Path<String>,
    direction: MoveDirection,
) -> Result<ApiResponse<Value>, ApiError> {
    let id = RuleId::from(id.as_str());
    let (moved, receipt) = state
        .engine
        .mutate("rule.move", Gate::Validated, |doc| move_rule(doc, &id, direction))
        .await?;
    Ok(committed(
        format!("route rule moved {}", direction.as_str()),
        &receipt,
        json!({ "from_index": moved.from, "to_index": moved.to }),
    ))
}

pub async fn reorder(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<ReorderRequest>,
) -> Result<ApiResponse<Value>, ApiError> {
    let (count, receipt) = state
        .engine
        .mutate("rule.reorder", Gate::Validated, |doc| reorder_rules(doc, &request.rule_ids))
        .await?;
    Ok(committed("route rules reordered", &receipt, json!({ "rules_count": count })))
}

fn decode_rule_set(body: Value) -> Result<RuleSet, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::bad_request(format!("invalid rule set: {}", e)))
}

fn parse_index(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid rule set index: {}", raw)))
}

pub async fn create_set(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<Value>,
) -> Result<ApiResponse<Value>, ApiError> {
    let rule_set = decode_rule_set(body)?;
    let gate = state.engine.rule_set_gate();
    let ((), receipt) = state
        .engine
        .mutate("rule_set.create", gate, |doc| create_rule_set(doc, rule_set))
        .await?;
    Ok(committed("rule set created", &receipt, json!({})))
}

pub async fn update_set(
    State(state): State<AppState>,
    Path(index): Path<String>,
    ApiJson(body): ApiJson<Value>,
) -> Result<ApiResponse<Value>, ApiError> {
    let index = parse_index(&index)?;
    let rule_set = decode_rule_set(body)?;
    let gate = state.engine.rule_set_gate();
    let ((), receipt) = state
        .engine
        .mutate("rule_set.update", gate, |doc| update_rule_set(doc, index, rule_set))
        .await?;
    Ok(committed("rule set updated", &receipt, json!({})))
}

pub async fn delete_set(
    State(state): State<AppState>,
    Path(index): Path<String>,
) -> Result<ApiResponse<Value>, ApiError> {
    let index = parse_index(&index)?;
    let gate = state.engine.rule_set_gate();
    let ((), receipt) = state
        .engine
        .mutate("rule_set.delete", gate, |doc| delete_rule_set(doc, index))
        .await?;
    Ok(committed("rule set deleted", &receipt, json!({})))
}
