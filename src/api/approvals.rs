use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::errors::ApiError;
use crate::models::approval::ApprovalRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub action: String,
    pub instance_id: String,
    pub region: String,
    pub requested_by: String,
    #[serde(default)]
    pub details: Value,
    pub l2_email: Option<String>,
}

/// Submit a change request for L2 review. At most one pending request per
/// (instance_id, region); the guard is a scan-then-insert, so concurrent
/// submissions can still race past it.
pub async fn submit_request(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<Value>, ApiError> {
    if state
        .approvals
        .has_pending(&payload.instance_id, &payload.region)
        .await?
    {
        return Err(ApiError::DuplicatePending);
    }

    let details = if payload.details.is_null() {
        json!({})
    } else {
        payload.details
    };
    let request = ApprovalRequest::new(
        payload.action,
        payload.instance_id,
        payload.region,
        payload.requested_by,
        details,
    );
    state.approvals.insert(&request).await?;

    let reviewer = payload
        .l2_email
        .unwrap_or_else(|| state.config.default_approver_email.clone());
    // The record is already written; a failed email must not fail the request.
    if let Err(err) = state.mailer.send_approval_request(&reviewer, &request).await {
        tracing::warn!(request_id = %request.request_id, "approval email failed: {err:#}");
    }

    Ok(Json(json!({
        "message": "Request submitted",
        "request_id": request.request_id,
    })))
}

pub async fn list_pending(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let requests = state.approvals.list_pending().await?;
    Ok(Json(json!({ "requests": requests })))
}

pub async fn approve_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.approvals.approve(&request_id).await? {
        Ok(Json(json!({ "message": "Request approved!" })))
    } else {
        Err(ApiError::NotFound(
            "Request not found or already processed.".into(),
        ))
    }
}

pub async fn reject_request(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if state.approvals.reject(&request_id).await? {
        Ok(Json(json!({ "message": "Request rejected" })))
    } else {
        Err(ApiError::NotFound(
            "Request not found or already processed.".into(),
        ))
    }
}

pub async fn list_approved(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let requests = state.approvals.list_approved().await?;
    Ok(Json(json!({ "requests": requests })))
}

pub async fn remove_approved(
    State(state): State<Arc<AppState>>,
    Path(request_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.approvals.remove_approved(&request_id).await?;
    Ok(Json(json!({ "message": "Approved request removed" })))
}
