//! Rate limiting error types for HTTP responses.

use crate::ratelimit::RateLimitResult;
use axum::http::header::HeaderValue;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Errors that can occur during rate limit checks.
#[derive(Debug)]
pub enum RateLimitError {
    /// Redis is unavailable (fail-open, but should be logged).
    RedisUnavailable,
    /// Request exceeded the rate limit.
    LimitExceeded(RateLimitResult),
    /// IP is temporarily blocked due to repeated verification failures.
    IpBlocked { retry_after: u64 },
}

/// JSON response body for rate limit errors.
#[derive(Serialize)]
pub struct RateLimitErrorResponse {
    /// Error code identifier.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Seconds to wait before retrying.
    pub retry_after: u64,
    /// Maximum requests allowed in the window.
    pub limit: u32,
    /// Remaining requests (always 0 when rate limited).
    pub remaining: u32,
}

fn too_many_requests(body: RateLimitErrorResponse) -> Response {
    let retry_after = body.retry_after;
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Ok(v) = HeaderValue::from_str(&retry_after.to_string()) {
        response.headers_mut().insert("Retry-After", v);
    }
    response
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        match self {
            Self::RedisUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({"error": "service_unavailable"})),
            )
                .into_response(),
            Self::LimitExceeded(result) => too_many_requests(RateLimitErrorResponse {
                error: "rate_limited",
                message: format!("Too many requests. Wait {} seconds.", result.retry_after),
                retry_after: result.retry_after,
                limit: result.limit,
                remaining: 0,
            }),
            Self::IpBlocked { retry_after } => too_many_requests(RateLimitErrorResponse {
                error: "ip_blocked",
                message: format!("IP blocked. Wait {retry_after} seconds."),
                retry_after,
                limit: 0,
                remaining: 0,
            }),
        }
    }
}
