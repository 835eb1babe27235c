//! Axum middleware for the webhook limits.
//!
//! Both endpoints are unauthenticated, so every limit is keyed by the
//! normalized client address.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use crate::api::AppState;
use crate::ratelimit::{
    client_key, NormalizedIp, RateLimitCategory, RateLimitError, RateLimiter, VerifiedSender,
};

/// Resolves the client key once per request and caches it in extensions.
pub fn request_ip(request: &mut Request, limiter: &RateLimiter) -> NormalizedIp {
    if let Some(ip) = request.extensions().get::<NormalizedIp>() {
        return ip.clone();
    }
    let connect_info = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .cloned();
    let ip = client_key(
        request.headers(),
        connect_info.as_ref(),
        limiter.config().trust_proxy,
    );
    request.extensions_mut().insert(ip.clone());
    ip
}

/// Applies the fail-open policy to a Redis outage.
fn unavailable(limiter: &RateLimiter, ip: &NormalizedIp, what: &str) -> Result<(), RateLimitError> {
    if limiter.config().fail_open {
        warn!(ip = %ip.0, check = what, "Redis unavailable, allowing request (fail_open=true)");
        Ok(())
    } else {
        Err(RateLimitError::RedisUnavailable)
    }
}

/// Counts the request against the category set by [`with_category`].
///
/// - Without a configured limiter requests pass through.
/// - Over the limit the caller gets `429` with `Retry-After`.
/// - Stores `NormalizedIp` in request extensions for downstream handlers.
#[tracing::instrument(skip(state, request, next))]
pub async fn rate_limit_by_ip(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let category = request
        .extensions()
        .get::<RateLimitCategory>()
        .copied()
        .unwrap_or(RateLimitCategory::WebhookEvent);

    let Some(rate_limiter) = state.rate_limiter.clone() else {
        return Ok(next.run(request).await);
    };

    let ip = request_ip(&mut request, &rate_limiter);

    debug!(category = %category.as_str(), ip = %ip.0, "Checking rate limit by IP");

    match rate_limiter.check(category, &ip.0).await {
        Ok(result) if !result.allowed => {
            debug!(
                category = %category.as_str(),
                ip = %ip.0,
                retry_after = result.retry_after,
                "Rate limit exceeded"
            );
            return Err(RateLimitError::LimitExceeded(result));
        }
        Ok(_) => {}
        Err(RateLimitError::RedisUnavailable) => unavailable(&rate_limiter, &ip, "rate_limit")?,
        Err(e) => return Err(e),
    }

    Ok(next.run(request).await)
}

/// Rejects callers blocked after repeated verification failures.
///
/// Layered outside [`rate_limit_by_ip`] so blocked addresses never consume
/// window budget. Requests carrying [`VerifiedSender`] pass regardless.
#[tracing::instrument(skip(state, request, next))]
pub async fn check_ip_not_blocked(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, RateLimitError> {
    let Some(rate_limiter) = state.rate_limiter.clone() else {
        return Ok(next.run(request).await);
    };
    if request.extensions().get::<VerifiedSender>().is_some() {
        return Ok(next.run(request).await);
    }

    let ip = request_ip(&mut request, &rate_limiter);

    match rate_limiter.is_blocked(&ip.0).await {
        Ok(true) => {
            let retry_after = rate_limiter.get_block_ttl(&ip.0).await.unwrap_or(0);
            debug!(ip = %ip.0, retry_after, "IP is blocked");
            return Err(RateLimitError::IpBlocked { retry_after });
        }
        Ok(false) => {}
        Err(RateLimitError::RedisUnavailable) => unavailable(&rate_limiter, &ip, "ip_block")?,
        Err(e) => return Err(e),
    }

    Ok(next.run(request).await)
}

/// Counts a failed verify-token or signature check against the caller.
///
/// Errors are logged and swallowed; the caller is already being rejected.
pub async fn record_verification_failure(state: &AppState, ip: Option<&NormalizedIp>) {
    let (Some(limiter), Some(ip)) = (state.rate_limiter.as_ref(), ip) else {
        return;
    };
    if let Err(e) = limiter.record_failed_verification(&ip.0).await {
        warn!(ip = %ip.0, error = ?e, "Failed to record verification failure");
    }
}

/// Sets the rate limit category for downstream middleware.
///
/// ```ignore
/// Router::new()
///     .route("/webhook", post(receive_webhook))
///     .layer(from_fn_with_state(state.clone(), rate_limit_by_ip))
///     .layer(from_fn(with_category(RateLimitCategory::WebhookEvent)));
/// ```
pub fn with_category(
    category: RateLimitCategory,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Response> + Send>>
       + Clone
       + Send
       + 'static {
    move |mut request: Request, next: Next| {
        request.extensions_mut().insert(category);
        Box::pin(async move { next.run(request).await })
    }
}
