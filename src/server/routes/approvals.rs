//! `POST /api/approvals/:approval_id`: deliver a human decision.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::info;

use crate::invocation::ApprovalDecision;
use crate::server::error::ApiError;
use crate::server::state::AppState;

async fn decide(
    State(state): State<AppState>,
    Path(approval_id): Path<String>,
    Json(decision): Json<ApprovalDecision>,
) -> Result<Json<Value>, ApiError> {
    let approved = decision.approved;
    let tool_call_id = state
        .orchestrator
        .approvals()
        .resolve(&approval_id, decision)
        .ok_or_else(|| ApiError::not_found("Unknown or expired approval"))?;

    info!(approval_id = %approval_id, tool_call_id = %tool_call_id, approved, "approval decided");
    Ok(Json(json!({
        "approvalId": approval_id,
        "toolCallId": tool_call_id,
        "approved": approved,
    })))
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/approvals/:approval_id", post(decide))
        .with_state(state)
}
