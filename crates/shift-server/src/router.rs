//! Axum router construction.
//!
//! Builds the full application router with all route groups, middleware
//! layers, and the Swagger UI.

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::context::AppContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::tasks::submit_task,
        routes::tasks::get_task,
        routes::tasks::history,
        routes::tasks::withdraw_task,
        routes::upload::upload_policy,
        routes::orders::create_order,
        routes::orders::pay_order,
        routes::files::download,
        routes::files::get_file,
        routes::files::put_file,
        routes::health::health_check,
    ),
    components(schemas(
        routes::tasks::SubmitTaskRequest,
        routes::tasks::TaskResponse,
        routes::upload::UploadPolicyRequest,
        routes::orders::CreateOrderRequest,
        routes::orders::OrderResponse,
        routes::files::DownloadResponse,
        shift_store::signing::SignedGrant,
        shift_core::TaskType,
        shift_core::TaskStatus,
    ))
)]
struct ApiDoc;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Body limit must admit the largest accepted upload.
    let body_limit = (ctx.config.limits.max_file_size_mb as usize) * 1024 * 1024;

    let api = Router::new()
        // Tasks
        .route("/tasks", post(routes::tasks::submit_task))
        .route("/tasks/{id}", get(routes::tasks::get_task))
        .route("/tasks/{id}", delete(routes::tasks::withdraw_task))
        .route("/history", get(routes::tasks::history))
        // Upload grants
        .route("/upload/policy", post(routes::upload::upload_policy))
        // Orders
        .route("/orders", post(routes::orders::create_order))
        .route("/orders/{id}/pay", post(routes::orders::pay_order))
        // Signed file transfer
        .route("/download/{task_id}", get(routes::files::download))
        .route(
            "/files/{*key}",
            get(routes::files::get_file).put(routes::files::put_file),
        );

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api)
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(ctx)
}
