//! Signed file transfer route handlers.
//!
//! `GET /api/download/{task_id}` issues a fresh signed URL for a completed
//! task's result; `GET`/`PUT /api/files/{*key}` serve and accept bytes
//! against the local store after signature verification.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use shift_core::{TaskId, TaskStatus};
use shift_store::ObjectStore;

use crate::context::AppContext;
use crate::error::AppError;
use crate::orchestrator;

/// Query parameters carried by every signed file URL.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct SignedFileParams {
    pub expires: i64,
    pub sig: String,
}

/// Response body for the download endpoint.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct DownloadResponse {
    /// Relative signed URL for the result file.
    pub url: String,
    /// Unix timestamp after which the URL stops working.
    pub expires: i64,
}

/// GET /api/download/:task_id
#[utoipa::path(
    get,
    path = "/api/download/{task_id}",
    params(("task_id" = String, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Signed download URL", body = DownloadResponse),
        (status = 400, description = "Task has no result yet"),
        (status = 404, description = "Task not found"),
        (status = 410, description = "Task expired")
    )
)]
pub async fn download(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<DownloadResponse>, AppError> {
    let task_id: TaskId = id
        .parse()
        .map_err(|_| shift_core::Error::Validation("Invalid task ID".into()))?;

    let task = orchestrator::query(&ctx, task_id, Utc::now())?;
    if task.status != TaskStatus::Completed {
        return Err(shift_core::Error::Validation(format!(
            "Task is {}, not completed",
            task.status
        ))
        .into());
    }
    let result_key = task
        .result_key
        .as_deref()
        .ok_or_else(|| shift_core::Error::Internal("Completed task has no result key".into()))?;

    let grant = ctx.signer.grant(result_key, Utc::now().timestamp())?;
    Ok(Json(DownloadResponse {
        url: format!(
            "/api/files/{}?expires={}&sig={}",
            grant.key, grant.expires, grant.signature
        ),
        expires: grant.expires,
    }))
}

/// GET /api/files/{*key}
#[utoipa::path(
    get,
    path = "/api/files/{key}",
    params(
        ("key" = String, Path, description = "Object key"),
        SignedFileParams
    ),
    responses(
        (status = 200, description = "File bytes"),
        (status = 400, description = "Bad or expired signature"),
        (status = 404, description = "Object not found")
    )
)]
pub async fn get_file(
    State(ctx): State<AppContext>,
    Path(key): Path<String>,
    Query(params): Query<SignedFileParams>,
) -> Result<impl IntoResponse, AppError> {
    ctx.signer
        .verify(&key, params.expires, &params.sig, Utc::now().timestamp())?;

    let data = ctx.store.get(&key)?;
    let file_name = key.rsplit('/').next().unwrap_or("file");

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        data,
    ))
}

/// PUT /api/files/{*key}
#[utoipa::path(
    put,
    path = "/api/files/{key}",
    params(
        ("key" = String, Path, description = "Object key"),
        SignedFileParams
    ),
    responses(
        (status = 201, description = "Object stored"),
        (status = 400, description = "Bad or expired signature")
    )
)]
pub async fn put_file(
    State(ctx): State<AppContext>,
    Path(key): Path<String>,
    Query(params): Query<SignedFileParams>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    ctx.signer
        .verify(&key, params.expires, &params.sig, Utc::now().timestamp())?;

    ctx.store.put(&key, &body)?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "key": key })),
    ))
}
