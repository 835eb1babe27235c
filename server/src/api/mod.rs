//! API Router and Application State
//!
//! Central routing configuration and shared state.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use fred::interfaces::ClientLike;
use serde::Serialize;
use sqlx::PgPool;
use tokio_util::task::TaskTracker;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    config::Config,
    db,
    ratelimit::{check_ip_not_blocked, rate_limit_by_ip, with_category, RateLimitCategory, RateLimiter},
    replies::ReplyGenerator,
    whatsapp::{handlers, verify_webhook_signature, GraphApiClient},
};

/// Service name reported by `GET /`.
pub const SERVICE_NAME: &str = "SuvFin";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Redis client
    pub redis: fred::clients::Client,
    /// Server configuration
    pub config: Arc<Config>,
    /// Outbound Graph API client
    pub whatsapp: GraphApiClient,
    /// Produces replies for inbound messages
    pub replies: Arc<dyn ReplyGenerator>,
    /// Rate limiter (optional, uses Redis)
    pub rate_limiter: Option<RateLimiter>,
    /// Background processing started by `POST /webhook`
    pub tasks: TaskTracker,
}

/// Everything needed to build an [`AppState`].
pub struct AppStateConfig {
    pub db: PgPool,
    pub redis: fred::clients::Client,
    pub config: Config,
    pub whatsapp: GraphApiClient,
    pub replies: Arc<dyn ReplyGenerator>,
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(cfg: AppStateConfig) -> Self {
        Self {
            db: cfg.db,
            redis: cfg.redis,
            config: Arc::new(cfg.config),
            whatsapp: cfg.whatsapp,
            replies: cfg.replies,
            rate_limiter: cfg.rate_limiter,
            tasks: TaskTracker::new(),
        }
    }
}

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_body_size = state.config.max_body_size;

    // Layers run bottom-up: category, block check, window count.
    let verify = get(handlers::verify_webhook)
        .layer(from_fn_with_state(state.clone(), rate_limit_by_ip))
        .layer(from_fn_with_state(state.clone(), check_ip_not_blocked))
        .layer(from_fn(with_category(RateLimitCategory::WebhookVerify)));

    // Signed deliveries skip the block check, so the signature runs first.
    let receive = post(handlers::receive_webhook)
        .layer(from_fn_with_state(state.clone(), rate_limit_by_ip))
        .layer(from_fn_with_state(state.clone(), check_ip_not_blocked))
        .layer(from_fn_with_state(state.clone(), verify_webhook_signature))
        .layer(from_fn(with_category(RateLimitCategory::WebhookEvent)));

    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/webhook", verify.merge(receive))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(max_body_size))
        // State
        .with_state(state)
}

/// Service info response.
#[derive(Serialize)]
struct ServiceInfo {
    service: &'static str,
    version: &'static str,
}

/// GET /
async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

/// Liveness probe. Never touches dependencies.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse { status: "healthy" })
}

/// Readiness probe response.
#[derive(Serialize)]
struct ReadinessResponse {
    status: &'static str,
    database: bool,
    redis: bool,
    rate_limiting: bool,
    whatsapp_configured: bool,
}

/// Readiness probe: 503 while PostgreSQL or Redis is unreachable.
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let database = db::ping_database(&state.db).await;
    let redis = state.redis.is_connected();
    let ready = database && redis;

    let body = ReadinessResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        redis,
        rate_limiting: state.rate_limiter.is_some(),
        whatsapp_configured: state.whatsapp.is_configured(),
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}
