//! Request ID middleware.
//!
//! Generates a UUID for each request (or honours an incoming
//! `x-request-id` header), scopes it so error rendering can stamp it into
//! response bodies, and echoes it back in the response headers.

use axum::http::{HeaderName, HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

/// Header name used for the request identifier.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

tokio::task_local! {
    static REQUEST_ID: String;
}

/// The ID of the request currently being handled, if any.
///
/// Only set while inside [`request_id_middleware`]'s scope; error
/// rendering falls back to `None` outside a request.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// Middleware that generates or extracts a request ID.
pub async fn request_id_middleware(
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let span = tracing::info_span!("request", request_id = %id);
    let mut response = REQUEST_ID
        .scope(id.clone(), next.run(request))
        .instrument(span)
        .await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(X_REQUEST_ID.clone(), val);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn id_is_scoped_to_the_request() {
        assert!(current_request_id().is_none());

        let seen = REQUEST_ID
            .scope("req-123".to_string(), async { current_request_id() })
            .await;
        assert_eq!(seen.as_deref(), Some("req-123"));

        assert!(current_request_id().is_none());
    }
}
