//! Webhook HTTP Handlers
//!
//! `GET /webhook` answers Meta's subscription handshake, `POST /webhook`
//! accepts event deliveries.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::signature::constant_time_eq;
use super::Dispatcher;
use crate::api::AppState;
use crate::error::ApiError;
use crate::ratelimit::{record_verification_failure, NormalizedIp};

/// Only mode Meta uses for the handshake.
const SUBSCRIBE_MODE: &str = "subscribe";

/// Handshake query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Acknowledgement returned for every accepted delivery.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReceivedResponse {
    pub status: String,
}

/// GET /webhook
///
/// Echoes `hub.challenge` verbatim when the token matches and the mode is
/// `subscribe`. Anything else, including a malformed query string, is a 403
/// that reveals neither value.
#[tracing::instrument(skip_all)]
pub async fn verify_webhook(
    State(state): State<AppState>,
    ip: Option<Extension<NormalizedIp>>,
    query: Result<Query<VerifyParams>, QueryRejection>,
) -> Result<String, ApiError> {
    let params = match query {
        Ok(Query(params)) => params,
        Err(e) => {
            warn!(error = %e, "Malformed handshake query");
            VerifyParams::default()
        }
    };
    let token_matches = params.verify_token.as_deref().is_some_and(|token| {
        constant_time_eq(token.as_bytes(), state.config.webhook_verify_token.as_bytes())
    });
    let mode_matches = params.mode.as_deref() == Some(SUBSCRIBE_MODE);

    match params.challenge {
        Some(challenge) if token_matches && mode_matches => {
            info!("Webhook verified");
            Ok(challenge)
        }
        _ => {
            let ip = ip.map(|Extension(ip)| ip);
            warn!(
                ip = ip.as_ref().map(|ip| ip.0.as_str()),
                mode = params.mode.as_deref(),
                has_token = params.verify_token.is_some(),
                "Webhook verification failed"
            );
            record_verification_failure(&state, ip.as_ref()).await;
            Err(ApiError::VerificationFailed)
        }
    }
}

/// POST /webhook
///
/// Acknowledges any JSON body immediately and processes it in the
/// background.
#[tracing::instrument(skip_all, fields(size = body.len()))]
pub async fn receive_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ReceivedResponse>, ApiError> {
    let payload: Value = serde_json::from_slice(&body).map_err(|e| {
        warn!(error = %e, "Webhook body is not valid JSON");
        ApiError::InvalidJson
    })?;

    Dispatcher::from_state(&state).spawn(payload);

    Ok(Json(ReceivedResponse {
        status: "received".to_string(),
    }))
}
