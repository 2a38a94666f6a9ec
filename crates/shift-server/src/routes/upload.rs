//! Upload policy route handler.
//!
//! Clients ask for a signed grant before uploading; the grant names the
//! object key the file must land under and expires after the configured
//! TTL.  The absolute size limit is enforced here as well so oversized
//! uploads are rejected before any bytes move.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::AppError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Request body for an upload grant.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UploadPolicyRequest {
    pub client_id: String,
    pub file_name: String,
    /// Declared size in bytes.
    pub file_size: i64,
}

/// POST /api/upload/policy
#[utoipa::path(
    post,
    path = "/api/upload/policy",
    request_body = UploadPolicyRequest,
    responses(
        (status = 200, description = "Signed upload grant", body = shift_store::signing::SignedGrant),
        (status = 400, description = "Validation failure or file too large")
    )
)]
pub async fn upload_policy(
    State(ctx): State<AppContext>,
    Json(payload): Json<UploadPolicyRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.client_id.is_empty() {
        return Err(shift_core::Error::Validation("client_id must not be empty".into()).into());
    }
    if payload.file_name.is_empty() {
        return Err(shift_core::Error::Validation("file_name must not be empty".into()).into());
    }
    if payload.file_size <= 0 {
        return Err(shift_core::Error::Validation("file_size must be positive".into()).into());
    }

    let size_mb = payload.file_size as f64 / BYTES_PER_MB;
    let max_mb = ctx.config.limits.max_file_size_mb;
    if size_mb > max_mb as f64 {
        return Err(shift_core::Error::FileTooLarge { size_mb, max_mb }.into());
    }

    let ext = std::path::Path::new(&payload.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("pdf");
    let key = format!("uploads/{}.{ext}", Uuid::new_v4());

    let grant = ctx.signer.grant(&key, Utc::now().timestamp())?;
    Ok((StatusCode::OK, Json(grant)))
}
