//! Middleware and extractors for the REST API server.

use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use missa_core::HolderId;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::ApiError;

/// Header carrying the identity of the holder a request acts for.
pub const HOLDER_HEADER: &str = "x-holder-id";

/// Create CORS middleware.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Request logging middleware.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let holder = request
        .headers()
        .get(HOLDER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let start = std::time::Instant::now();

    let response = next.run(request).await;

    let duration = start.elapsed();
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        holder = %holder,
        status = %status.as_u16(),
        duration_ms = %duration.as_millis(),
        "Request completed"
    );

    response
}

/// Holder resolved from the `X-Holder-Id` header.
#[derive(Debug, Clone)]
pub struct Holder(pub HolderId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Holder
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(HOLDER_HEADER)
            .ok_or_else(|| ApiError::bad_request("missing X-Holder-Id header"))?
            .to_str()
            .map_err(|_| ApiError::bad_request("X-Holder-Id header is not valid text"))?;

        HolderId::new(raw)
            .map(Holder)
            .map_err(|e| ApiError::bad_request(e.to_string()))
    }
}
