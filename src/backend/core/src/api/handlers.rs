//! HTTP request handlers.
//!
//! Handlers only translate between HTTP and the services. Authorization has
//! already happened in the route's permission layer, and scoping happens in
//! the services.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::json;

use super::{ApiResponse, AppState};
use crate::error::Result;
use crate::rbac::Principal;
use crate::tasks::{CreateTaskRequest, UpdateTaskRequest};
use crate::users::CreateUserRequest;

// ═══════════════════════════════════════════════════════════════════════════════
// Health & Metrics
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.store.backend();
    let (status, health) = match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "healthy"),
        Err(err) => {
            tracing::warn!(backend, error = %err, "Health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
        }
    };

    (
        status,
        Json(json!({
            "status": health,
            "backend": backend,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// Task Handlers
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn list_tasks(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse> {
    let tasks = state.tasks.list(principal).await?;
    Ok(Json(ApiResponse::success(tasks)))
}

pub async fn get_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    let task = state.tasks.get(principal, id).await?;
    Ok(Json(ApiResponse::success(task)))
}

pub async fn create_task(
    State(state): State<AppState>,
    principal: Principal,
    payload: std::result::Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload?;
    let task = state.tasks.create(principal, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(task))))
}

pub async fn update_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
    payload: std::result::Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload?;
    let task = state.tasks.update(principal, id, request).await?;
    Ok(Json(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse> {
    state.tasks.delete(principal, id).await?;
    Ok(Json(ApiResponse::success(json!({ "deleted": true, "id": id }))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// User Handlers
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn list_users(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse> {
    let users = state.users.list(principal).await?;
    Ok(Json(ApiResponse::success(users)))
}

pub async fn create_user(
    State(state): State<AppState>,
    principal: Principal,
    payload: std::result::Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload?;
    let user = state.users.create(principal, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Audit Log
// ═══════════════════════════════════════════════════════════════════════════════

pub async fn list_audit_log(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<impl IntoResponse> {
    let records = state.audit.list_all(&principal).await?;
    Ok(Json(ApiResponse::success(records)))
}
