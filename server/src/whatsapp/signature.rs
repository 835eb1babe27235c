//! `X-Hub-Signature-256` verification.
//!
//! Meta signs every event delivery with HMAC-SHA256 over the raw body, keyed
//! with the app secret, and sends it as `sha256=<hex>`.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, warn};

use crate::api::AppState;
use crate::error::ApiError;
use crate::ratelimit::{record_verification_failure, request_ip, VerifiedSender};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "X-Hub-Signature-256";

const SIGNATURE_PREFIX: &str = "sha256=";

/// Sign a payload and return the header value (`sha256=<hex>`).
pub fn sign_payload(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    format!("{SIGNATURE_PREFIX}{}", hex::encode(mac.finalize().into_bytes()))
}

/// Verify a header value against a payload.
///
/// Header values without the `sha256=` prefix never match.
pub fn verify_signature(secret: &str, payload: &[u8], header_value: &str) -> bool {
    if !header_value.starts_with(SIGNATURE_PREFIX) {
        return false;
    }
    constant_time_eq(sign_payload(secret, payload).as_bytes(), header_value.as_bytes())
}

/// Compare two byte strings without short-circuiting on the first mismatch.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Middleware verifying the body signature of event deliveries.
///
/// Buffers the body (bounded by the configured body limit), checks it and
/// hands an identical body to the handler. Runs before the IP block check;
/// verified requests are tagged with [`VerifiedSender`].
pub async fn verify_webhook_signature(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(secret) = state.config.facebook_app_secret.clone() else {
        warn!("FACEBOOK_APP_SECRET not set, skipping signature verification");
        return next.run(request).await;
    };

    let ip = state
        .rate_limiter
        .as_ref()
        .map(|limiter| request_ip(&mut request, limiter));

    let (mut parts, body) = request.into_parts();
    let header = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let Some(header) = header else {
        if state.config.app_env.is_development() {
            warn!("Signature header missing, accepted in development");
            return next.run(Request::from_parts(parts, body)).await;
        }
        return ApiError::MissingSignature.into_response();
    };

    let bytes = match to_bytes(body, state.config.max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "Failed to buffer webhook body");
            return ApiError::InvalidBody.into_response();
        }
    };

    if !verify_signature(&secret, &bytes, &header) {
        warn!(ip = ip.as_ref().map(|ip| ip.0.as_str()), "Invalid webhook signature");
        record_verification_failure(&state, ip.as_ref()).await;
        return ApiError::InvalidSignature.into_response();
    }

    parts.extensions.insert(VerifiedSender);
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
