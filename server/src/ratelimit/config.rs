//! Rate limiting configuration.

use std::collections::HashSet;
use std::time::Duration;

/// Configuration for the rate limiting system.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Whether rate limiting is enabled
    pub enabled: bool,
    /// Prefix for Redis keys (e.g., "suvfin:rl")
    pub redis_key_prefix: String,
    /// Whether to allow requests when Redis is unavailable
    pub fail_open: bool,
    /// Upper bound on a single Redis call before it counts as unavailable
    pub command_timeout: Duration,
    /// Whether to key callers by the address the reverse proxy forwarded
    pub trust_proxy: bool,
    /// IP addresses that bypass rate limiting
    pub allowlist: HashSet<String>,
    /// Per-category rate limits
    pub limits: RateLimits,
}

/// Rate limits for each category.
#[derive(Debug, Clone)]
pub struct RateLimits {
    /// Event deliveries
    pub webhook_event: LimitConfig,
    /// Verification handshakes
    pub webhook_verify: LimitConfig,
    /// Failed verification tracking
    pub failed_verification: FailedVerificationConfig,
}

/// Configuration for a single rate limit.
#[derive(Debug, Clone)]
pub struct LimitConfig {
    /// Maximum requests allowed in the window
    pub requests: u32,
    /// Window duration in seconds
    pub window_secs: u64,
}

/// Configuration for failed verification tracking.
#[derive(Debug, Clone)]
pub struct FailedVerificationConfig {
    /// Failures tolerated per window; the next one blocks
    pub max_failures: u32,
    /// Duration to block in seconds after max failures
    pub block_duration_secs: u64,
    /// Window for counting failures in seconds
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            redis_key_prefix: "suvfin:rl".to_string(),
            fail_open: true,
            command_timeout: Duration::from_millis(500),
            trust_proxy: true,
            allowlist: HashSet::new(),
            limits: RateLimits::default(),
        }
    }
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            webhook_event: LimitConfig { requests: 30, window_secs: 60 },
            webhook_verify: LimitConfig { requests: 10, window_secs: 60 },
            failed_verification: FailedVerificationConfig {
                max_failures: 10,
                block_duration_secs: 900,
                window_secs: 300,
            },
        }
    }
}

impl RateLimitConfig {
    /// Creates configuration from environment variables.
    ///
    /// Environment variables:
    /// - `RATE_LIMIT_ENABLED`: Enable/disable rate limiting (default: true)
    /// - `RATE_LIMIT_PREFIX`: Redis key prefix (default: "suvfin:rl")
    /// - `RATE_LIMIT_FAIL_OPEN`: Allow requests when Redis unavailable (default: true)
    /// - `RATE_LIMIT_REDIS_TIMEOUT_MS`: Per-call Redis timeout (default: 500)
    /// - `RATE_LIMIT_TRUST_PROXY`: Key callers by the last `X-Forwarded-For` hop
    ///   (default: true, the gateway runs behind a reverse proxy). Set to
    ///   false when clients connect directly, or they can pick their own key.
    /// - `RATE_LIMIT_ALLOWLIST`: Comma-separated IP allowlist
    /// - `RATE_LIMIT_WEBHOOK_EVENT`: Event limit as "requests,window_secs"
    /// - `RATE_LIMIT_WEBHOOK_VERIFY`: Handshake limit as "requests,window_secs"
    /// - `RATE_LIMIT_FAILED_VERIFICATION`: "max_failures,block_duration_secs,window_secs"
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("RATE_LIMIT_ENABLED") {
            config.enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_PREFIX") {
            config.redis_key_prefix = val;
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_FAIL_OPEN") {
            config.fail_open = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_REDIS_TIMEOUT_MS") {
            if let Ok(ms) = val.parse() {
                config.command_timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_TRUST_PROXY") {
            config.trust_proxy = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_ALLOWLIST") {
            config.allowlist = val
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Ok(val) = std::env::var("RATE_LIMIT_WEBHOOK_EVENT") {
            if let Some(limit) = parse_limit_config(&val) {
                config.limits.webhook_event = limit;
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_WEBHOOK_VERIFY") {
            if let Some(limit) = parse_limit_config(&val) {
                config.limits.webhook_verify = limit;
            }
        }
        if let Ok(val) = std::env::var("RATE_LIMIT_FAILED_VERIFICATION") {
            if let Some(limit) = parse_failed_verification_config(&val) {
                config.limits.failed_verification = limit;
            }
        }

        config
    }
}

/// Parses a limit config from "requests,window_secs" format.
fn parse_limit_config(val: &str) -> Option<LimitConfig> {
    let parts: Vec<&str> = val.split(',').collect();
    if parts.len() == 2 {
        let requests = parts[0].trim().parse().ok()?;
        let window_secs = parts[1].trim().parse().ok()?;
        Some(LimitConfig { requests, window_secs })
    } else {
        None
    }
}

/// Parses "max_failures,block_duration_secs,window_secs".
fn parse_failed_verification_config(val: &str) -> Option<FailedVerificationConfig> {
    let parts: Vec<&str> = val.split(',').collect();
    if parts.len() == 3 {
        let max_failures = parts[0].trim().parse().ok()?;
        let block_duration_secs = parts[1].trim().parse().ok()?;
        let window_secs = parts[2].trim().parse().ok()?;
        Some(FailedVerificationConfig {
            max_failures,
            block_duration_secs,
            window_secs,
        })
    } else {
        None
    }
}
