//! Logging and error reporting.
//!
//! JSON logs through `tracing-subscriber`; error events additionally go to
//! Sentry when a DSN is configured.

use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::Config;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "suvfin_server=info,tower_http=info";

/// Fraction of transactions sent to Sentry.
const TRACES_SAMPLE_RATE: f32 = 0.1;

/// Start Sentry when `SENTRY_DSN` is set.
///
/// Bind the returned guard to a variable that lives until the end of `main`;
/// dropping it flushes pending events.
pub fn init_error_reporting(config: &Config) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.clone()?;

    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: Some(config.app_env.as_str().into()),
            sample_rate: 1.0,
            traces_sample_rate: TRACES_SAMPLE_RATE,
            send_default_pii: false,
            before_send: Some(std::sync::Arc::new(|mut event: sentry::protocol::Event<'static>| {
                event
                    .extra
                    .retain(|key, _| !is_forbidden_attribute_key(key));
                Some(event)
            })),
            ..Default::default()
        },
    )))
}

/// Install the global subscriber.
///
/// `with_sentry` adds the layer forwarding error events (and warnings as
/// breadcrumbs); pass whether [`init_error_reporting`] returned a guard.
pub fn init_tracing(with_sentry: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().json())
        .with(with_sentry.then(|| sentry_tracing::layer()))
        .init();
}

/// Field names that must never reach the error tracker.
fn is_forbidden_attribute_key(key: &str) -> bool {
    const FORBIDDEN_PATTERNS: [&str; 7] = [
        "token",
        "secret",
        "key",
        "authorization",
        "signature",
        "body",
        "challenge",
    ];

    let lowered = key.to_ascii_lowercase();
    FORBIDDEN_PATTERNS
        .iter()
        .any(|pattern| lowered.contains(pattern))
}
