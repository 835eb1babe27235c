//! HTTP Integration Tests for the webhook endpoints
//!
//! Drives the full router with `oneshot`. No PostgreSQL or Redis needed:
//! processing spawned by `POST /webhook` fails open against the offline pool.
//!
//! Run with: `cargo test --test webhook_http_test`

mod helpers;

use axum::http::{header, StatusCode};
use helpers::{body_string, body_to_json, status_payload, text_message_payload, TestApp};
use suvfin_server::config::{AppEnv, Config};
use suvfin_server::whatsapp::sign_payload;

const APP_SECRET: &str = "test_app_secret";

fn production_with_secret() -> Config {
    Config {
        app_env: AppEnv::Production,
        facebook_app_secret: Some(APP_SECRET.into()),
        ..Config::default_for_test()
    }
}

// ============================================================================
// Health endpoints
// ============================================================================

#[tokio::test]
async fn test_health_is_exactly_healthy() {
    let app = TestApp::new();

    let resp = app.get("/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, r#"{"status":"healthy"}"#);
}

#[tokio::test]
async fn test_root_reports_service_and_version() {
    let app = TestApp::new();

    let json = body_to_json(app.get("/").await).await;
    assert_eq!(json["service"], "SuvFin");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_readiness_degraded_without_dependencies() {
    let app = TestApp::new();

    let resp = app.get("/health/ready").await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_to_json(resp).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["database"], false);
    assert_eq!(json["redis"], false);
}

// ============================================================================
// Verification handshake
// ============================================================================

#[tokio::test]
async fn test_verify_echoes_challenge() {
    let app = TestApp::new();

    let resp = app
        .get("/webhook?hub.mode=subscribe&hub.verify_token=test_verify_token&hub.challenge=1158201444")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"), "got {content_type}");
    assert_eq!(body_string(resp).await, "1158201444");
}

#[tokio::test]
async fn test_verify_example_token_abc123() {
    let app = TestApp::with_config(Config {
        webhook_verify_token: "abc123".into(),
        ..Config::default_for_test()
    });

    let resp = app
        .get("/webhook?hub.mode=subscribe&hub.verify_token=abc123&hub.challenge=test")
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, "test");
}

#[tokio::test]
async fn test_verify_wrong_token_leaks_nothing() {
    let app = TestApp::new();

    let resp = app
        .get("/webhook?hub.mode=subscribe&hub.verify_token=guess&hub.challenge=secret-challenge-42")
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let body = body_string(resp).await;
    assert!(!body.contains("test_verify_token"), "secret leaked: {body}");
    assert!(!body.contains("secret-challenge-42"), "challenge echoed: {body}");
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["error"], "VERIFICATION_FAILED");
}

#[tokio::test]
async fn test_verify_rejects_wrong_mode() {
    let app = TestApp::new();

    let resp = app
        .get("/webhook?hub.mode=unsubscribe&hub.verify_token=test_verify_token&hub.challenge=x")
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_verify_rejects_missing_parameters() {
    let app = TestApp::new();

    assert_eq!(app.get("/webhook").await.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        app.get("/webhook?hub.mode=subscribe&hub.challenge=x")
            .await
            .status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.get("/webhook?hub.mode=subscribe&hub.verify_token=test_verify_token")
            .await
            .status(),
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_verify_repeated_parameter_is_forbidden() {
    let app = TestApp::new();

    let resp = app
        .get("/webhook?hub.mode=subscribe&hub.verify_token=a&hub.verify_token=b&hub.challenge=x")
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_to_json(resp).await["error"], "VERIFICATION_FAILED");
}

#[tokio::test]
async fn test_verify_token_prefix_is_not_enough() {
    let app = TestApp::new();

    let resp = app
        .get("/webhook?hub.mode=subscribe&hub.verify_token=test_verify&hub.challenge=x")
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ============================================================================
// Event ingestion
// ============================================================================

#[tokio::test]
async fn test_receive_acknowledges_message() {
    let app = TestApp::new();
    let body = serde_json::to_vec(&text_message_payload("wamid.HTTP1", "5511999999999", "oi")).unwrap();

    let resp = app.post_webhook(&body, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["status"], "received");
}

#[tokio::test]
async fn test_receive_acknowledges_status_only_change() {
    let app = TestApp::new();
    let body = serde_json::to_vec(&status_payload()).unwrap();

    let resp = app.post_webhook(&body, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_receive_acknowledges_non_message_change() {
    let app = TestApp::new();
    let body = br#"{"object":"whatsapp_business_account","entry":[{"id":"1","changes":[{"field":"account_update","value":{}}]}]}"#;

    let resp = app.post_webhook(body, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["status"], "received");
}

#[tokio::test]
async fn test_receive_acknowledges_unknown_objects() {
    let app = TestApp::new();

    let resp = app
        .post_webhook(br#"{"object":"instagram","entry":[]}"#, None)
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.post_webhook(br#"[1,2,3]"#, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_receive_rejects_invalid_json() {
    let app = TestApp::new();

    let resp = app.post_webhook(b"{not json", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_to_json(resp).await["error"], "INVALID_JSON");
}

// ============================================================================
// Signatures
// ============================================================================

#[tokio::test]
async fn test_signed_body_is_accepted() {
    let app = TestApp::with_config(production_with_secret());
    let body = serde_json::to_vec(&status_payload()).unwrap();
    let signature = sign_payload(APP_SECRET, &body);

    let resp = app.post_webhook(&body, Some(&signature)).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_tampered_body_is_rejected() {
    let app = TestApp::with_config(production_with_secret());
    let body = serde_json::to_vec(&status_payload()).unwrap();
    let signature = sign_payload(APP_SECRET, &body);
    let mut tampered = body.clone();
    tampered.extend_from_slice(b" ");

    let resp = app.post_webhook(&tampered, Some(&signature)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_to_json(resp).await["error"], "INVALID_SIGNATURE");
}

#[tokio::test]
async fn test_missing_signature_rejected_in_production() {
    let app = TestApp::with_config(production_with_secret());

    let resp = app.post_webhook(br#"{"object":"whatsapp_business_account"}"#, None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_to_json(resp).await["error"], "MISSING_SIGNATURE");
}

#[tokio::test]
async fn test_missing_signature_allowed_in_development() {
    let app = TestApp::with_config(Config {
        app_env: AppEnv::Development,
        ..production_with_secret()
    });

    let resp = app.post_webhook(br#"{"object":"whatsapp_business_account"}"#, None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_bad_signature_rejected_even_in_development() {
    let app = TestApp::with_config(Config {
        app_env: AppEnv::Development,
        ..production_with_secret()
    });

    let resp = app
        .post_webhook(br#"{"object":"whatsapp_business_account"}"#, Some("sha256=deadbeef"))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signature_checked_before_json() {
    let app = TestApp::with_config(production_with_secret());

    let resp = app.post_webhook(b"{not json", Some("sha256=00")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let signature = sign_payload(APP_SECRET, b"{not json");
    let resp = app.post_webhook(b"{not json", Some(&signature)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_no_secret_skips_verification() {
    let app = TestApp::with_config(Config {
        app_env: AppEnv::Production,
        facebook_app_secret: None,
        ..Config::default_for_test()
    });

    let resp = app
        .post_webhook(br#"{"object":"whatsapp_business_account"}"#, Some("sha256=garbage"))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}
