//! Management API under `/api`.
//!
//! # Data Flow
//! ```text
//! Request
//!     → auth.rs (optional bearer key)
//!     → handler (config / outbounds / rules / services)
//!     → mutation::ConfigEngine (load → edit → validate → write)
//!     → http::response (envelope or ApiError)
//! ```
//!
//! # Design Decisions
//! - Handlers stay thin: decode, call the engine, shape the response
//! - Every committed mutation reports `need_restart`; applying the change
//!   to the running service is a separate, explicit call

pub mod auth;
pub mod config;
pub mod outbounds;
pub mod rules;
pub mod services;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use serde_json::{Map, Value};

use crate::http::{ApiError, ApiResponse, AppState};
use crate::mutation::CommitReceipt;

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/services", get(services::list))
        .route("/services/{name}", get(services::get))
        .route("/services/{name}/action", post(services::control))
        .route("/config/{service}", get(config::get_raw_config).put(config::put_raw_config))
        .route(
            "/singbox/config",
            get(config::get_singbox_config).put(config::put_singbox_config),
        )
        .route("/singbox/config/jobs/{id}", get(config::get_job))
        .route("/singbox/config/validate", post(config::validate_config))
        .route("/singbox/config/validate-current", post(config::validate_current))
        .route("/singbox/inbounds", get(outbounds::list_inbounds))
        .route("/singbox/outbounds", get(outbounds::list_outbounds).post(outbounds::create))
        .route("/singbox/outbounds/{id}", put(outbounds::update).delete(outbounds::delete))
        .route("/singbox/outbounds/validate", post(outbounds::validate_changes))
        .route("/singbox/outbounds/batch-save", post(outbounds::batch_save))
        .route("/singbox/restart", post(services::restart_singbox))
        .route("/singbox/rules", get(rules::list))
        .route("/singbox/rules/route", post(rules::create))
        .route("/singbox/rules/route/reorder", post(rules::reorder))
        .route("/singbox/rules/route/{id}", put(rules::update).delete(rules::delete))
        .route("/singbox/rules/route/{id}/move-up", post(rules::move_up))
        .route("/singbox/rules/route/{id}/move-down", post(rules::move_down))
        .route("/singbox/rulesets", post(rules::create_set))
        .route("/singbox/rulesets/{index}", put(rules::update_set).delete(rules::delete_set))
        .route("/singbox/kernel/detect-path", get(services::detect_path))
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_key))
        .fallback(|| async { ApiError::not_found("API endpoint not found") })
}

/// Response for a committed mutation: `extra` plus `need_restart`, the
/// validation method when the checker ran, and the backup path when one
/// was taken.
pub(crate) fn committed(message: impl Into<String>, receipt: &CommitReceipt, extra: Value) -> ApiResponse<Value> {
    let mut data = match extra {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    data.insert("need_restart".into(), Value::Bool(true));
    if receipt.validated {
        data.insert("validation_method".into(), Value::from(config::VALIDATION_METHOD));
    }
    if let Some(backup) = &receipt.backup {
        data.insert("backup_path".into(), Value::from(backup.display().to_string()));
    }
    ApiResponse::with_message(message, Value::Object(data))
}
