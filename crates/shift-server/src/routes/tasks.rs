//! Task API route handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use shift_core::{TaskId, TaskStatus, TaskType};
use shift_db::models::Task;

use crate::context::AppContext;
use crate::error::AppError;
use crate::orchestrator::{self, SubmitTask};

/// Request body for submitting a task.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SubmitTaskRequest {
    pub client_id: String,
    pub file_name: String,
    /// Declared size of the uploaded source in bytes.
    pub file_size: i64,
    /// Object key returned by the upload policy endpoint.
    pub source_key: String,
    pub task_type: TaskType,
}

/// Task response body.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct TaskResponse {
    pub task_id: String,
    pub status: TaskStatus,
    pub task_type: TaskType,
    pub file_name: String,
    pub file_size: i64,
    pub is_paid: bool,
    pub error_msg: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub expire_at: String,
    /// Signed download URL, present once the task is completed.
    pub download_url: Option<String>,
}

impl TaskResponse {
    pub(crate) fn from_model(task: &Task, download_url: Option<String>) -> Self {
        Self {
            task_id: task.task_id.to_string(),
            status: task.status,
            task_type: task.task_type,
            file_name: task.file_name.clone(),
            file_size: task.file_size,
            is_paid: task.is_paid,
            error_msg: task.error_msg.clone(),
            created_at: task.created_at.to_rfc3339(),
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
            expire_at: task.expire_at.to_rfc3339(),
            download_url,
        }
    }
}

/// Build a signed download URL for a completed task.
pub(crate) fn download_url(ctx: &AppContext, task: &Task) -> Option<String> {
    if task.status != TaskStatus::Completed {
        return None;
    }
    let result_key = task.result_key.as_deref()?;
    let grant = ctx.signer.grant(result_key, Utc::now().timestamp()).ok()?;
    Some(format!(
        "/api/files/{}?expires={}&sig={}",
        grant.key, grant.expires, grant.signature
    ))
}

/// POST /api/tasks
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = SubmitTaskRequest,
    responses(
        (status = 201, description = "Task accepted", body = TaskResponse),
        (status = 400, description = "Validation failure or file too large"),
        (status = 402, description = "Payment required for files over the free limit")
    )
)]
pub async fn submit_task(
    State(ctx): State<AppContext>,
    Json(payload): Json<SubmitTaskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let task = orchestrator::submit(
        &ctx,
        SubmitTask {
            client_id: payload.client_id,
            file_name: payload.file_name,
            file_size: payload.file_size,
            source_key: payload.source_key,
            task_type: payload.task_type,
        },
        Utc::now(),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(TaskResponse::from_model(&task, None)),
    ))
}

/// GET /api/tasks/:id
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task details", body = TaskResponse),
        (status = 404, description = "Task not found"),
        (status = 410, description = "Task expired")
    )
)]
pub async fn get_task(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>, AppError> {
    let task_id: TaskId = id
        .parse()
        .map_err(|_| shift_core::Error::Validation("Invalid task ID".into()))?;

    let task = orchestrator::query(&ctx, task_id, Utc::now())?;
    let url = download_url(&ctx, &task);
    Ok(Json(TaskResponse::from_model(&task, url)))
}

/// Query parameters for the history listing.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct HistoryParams {
    pub client_id: String,
    #[serde(default = "default_history_limit")]
    pub limit: i64,
}

fn default_history_limit() -> i64 {
    10
}

/// GET /api/history
#[utoipa::path(
    get,
    path = "/api/history",
    params(HistoryParams),
    responses(
        (status = 200, description = "Paid task history, newest first", body = Vec<TaskResponse>)
    )
)]
pub async fn history(
    State(ctx): State<AppContext>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<TaskResponse>>, AppError> {
    let tasks = orchestrator::history(&ctx, &params.client_id, params.limit)?;
    let responses = tasks
        .iter()
        .map(|task| TaskResponse::from_model(task, download_url(&ctx, task)))
        .collect();
    Ok(Json(responses))
}

/// Query parameters for withdrawing a task.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct WithdrawParams {
    pub client_id: String,
}

/// DELETE /api/tasks/:id
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(
        ("id" = String, Path, description = "Task ID"),
        WithdrawParams
    ),
    responses(
        (status = 200, description = "Task withdrawn"),
        (status = 404, description = "Task not found for this client")
    )
)]
pub async fn withdraw_task(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(params): Query<WithdrawParams>,
) -> Result<impl IntoResponse, AppError> {
    let task_id: TaskId = id
        .parse()
        .map_err(|_| shift_core::Error::Validation("Invalid task ID".into()))?;

    orchestrator::withdraw(&ctx, task_id, &params.client_id)?;
    Ok(Json(serde_json::json!({ "status": "withdrawn" })))
}
