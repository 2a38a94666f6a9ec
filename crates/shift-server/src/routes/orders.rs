//! Payment order route handlers.
//!
//! Minimal ledger surface: create an order for an uploaded file and confirm
//! its payment.  The payment-gateway protocol itself lives outside this
//! service; confirmation is whatever the operator's callback invokes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use shift_core::OrderId;
use shift_db::models::Order;
use shift_db::pool::get_conn;
use shift_db::queries::orders;

use crate::context::AppContext;
use crate::error::AppError;

/// Request body for creating an order.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateOrderRequest {
    pub client_id: String,
    /// Object key of the uploaded file the order pays for.
    pub source_key: String,
    /// Amount in the smallest currency unit.
    pub amount: i64,
}

/// Order response body.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct OrderResponse {
    pub order_id: String,
    pub client_id: String,
    pub source_key: String,
    pub amount: i64,
    pub status: String,
    pub paid_at: Option<String>,
    pub created_at: String,
}

impl OrderResponse {
    fn from_model(order: &Order) -> Self {
        Self {
            order_id: order.order_id.to_string(),
            client_id: order.client_id.clone(),
            source_key: order.source_key.clone(),
            amount: order.amount,
            status: order.status.clone(),
            paid_at: order.paid_at.map(|t| t.to_rfc3339()),
            created_at: order.created_at.to_rfc3339(),
        }
    }
}

/// POST /api/orders
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Validation failure")
    )
)]
pub async fn create_order(
    State(ctx): State<AppContext>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.client_id.is_empty() {
        return Err(shift_core::Error::Validation("client_id must not be empty".into()).into());
    }
    if payload.source_key.is_empty() {
        return Err(shift_core::Error::Validation("source_key must not be empty".into()).into());
    }
    if payload.amount <= 0 {
        return Err(shift_core::Error::Validation("amount must be positive".into()).into());
    }

    let conn = get_conn(&ctx.db)?;
    let order = orders::create_order(
        &conn,
        &payload.client_id,
        &payload.source_key,
        payload.amount,
        Utc::now(),
    )?;

    Ok((StatusCode::CREATED, Json(OrderResponse::from_model(&order))))
}

/// POST /api/orders/:id/pay
#[utoipa::path(
    post,
    path = "/api/orders/{id}/pay",
    params(("id" = String, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Payment confirmed", body = OrderResponse),
        (status = 400, description = "Order is not payable"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn pay_order(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, AppError> {
    let order_id: OrderId = id
        .parse()
        .map_err(|_| shift_core::Error::Validation("Invalid order ID".into()))?;

    let conn = get_conn(&ctx.db)?;
    orders::get_order(&conn, order_id)?
        .ok_or_else(|| shift_core::Error::not_found("order", order_id))?;

    if !orders::mark_paid(&conn, order_id, Utc::now())? {
        return Err(shift_core::Error::Validation("Order is not payable".into()).into());
    }

    let order = orders::get_order(&conn, order_id)?
        .ok_or_else(|| shift_core::Error::not_found("order", order_id))?;

    tracing::info!(order_id = %order_id, "Order paid");
    Ok(Json(OrderResponse::from_model(&order)))
}
