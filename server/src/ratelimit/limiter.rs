//! Core rate limiter service using Redis.

use std::future::Future;
use std::sync::Arc;

use fred::prelude::*;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::ratelimit::{
    FailedVerificationConfig, LimitConfig, RateLimitCategory, RateLimitConfig, RateLimitError,
    RateLimitResult, SCRIPT_ALLOWED,
};

/// Embedded Lua script for atomic rate limit check and increment.
const RATE_LIMIT_SCRIPT: &str = include_str!("rate_limit.lua");

/// Embedded Lua script for atomic failure tracking and blocking.
const FAILED_VERIFICATION_SCRIPT: &str = include_str!("failed_verification.lua");

/// Script SHAs for Lua scripts loaded in Redis.
#[derive(Clone, Default)]
struct ScriptShas {
    rate_limit: String,
    failed_verification: String,
}

/// Which embedded script to run.
#[derive(Clone, Copy)]
enum Script {
    RateLimit,
    FailedVerification,
}

/// Core rate limiter service backed by Redis.
///
/// Counters are shared by every gateway worker through Redis, so limits hold
/// across processes.
#[derive(Clone)]
pub struct RateLimiter {
    redis: Client,
    config: Arc<RateLimitConfig>,
    scripts: Arc<RwLock<ScriptShas>>,
}

impl RateLimiter {
    /// Creates a new rate limiter instance.
    ///
    /// Call `init()` after creation to load the Lua scripts into Redis.
    pub fn new(redis: Client, config: RateLimitConfig) -> Self {
        Self {
            redis,
            config: Arc::new(config),
            scripts: Arc::new(RwLock::new(ScriptShas::default())),
        }
    }

    /// Initializes the rate limiter by loading Lua scripts into Redis.
    pub async fn init(&mut self) -> Result<(), Error> {
        self.load_scripts().await
    }

    /// Loads or reloads Lua scripts into Redis.
    ///
    /// Called during init and when NOSCRIPT errors are encountered.
    async fn load_scripts(&self) -> Result<(), Error> {
        let rate_limit_sha: String = self
            .bounded(self.redis.script_load(RATE_LIMIT_SCRIPT))
            .await?;
        let failed_sha: String = self
            .bounded(self.redis.script_load(FAILED_VERIFICATION_SCRIPT))
            .await?;

        info!(
            rate_limit_sha = %rate_limit_sha,
            failed_verification_sha = %failed_sha,
            "Lua scripts loaded into Redis"
        );

        let mut scripts = self.scripts.write().await;
        scripts.rate_limit = rate_limit_sha;
        scripts.failed_verification = failed_sha;
        Ok(())
    }

    /// Runs a Redis call under the configured command timeout.
    async fn bounded<T>(&self, call: impl Future<Output = Result<T, Error>>) -> Result<T, Error> {
        tokio::time::timeout(self.config.command_timeout, call)
            .await
            .unwrap_or_else(|_| Err(Error::new(ErrorKind::Timeout, "Redis command timed out")))
    }

    /// Checks if an error is a NOSCRIPT error (script not found in Redis).
    fn is_noscript_error(error: &Error) -> bool {
        error.to_string().contains("NOSCRIPT")
    }

    /// Checks and increments the rate limit for a given category and identifier.
    ///
    /// # Errors
    /// Returns `RateLimitError::RedisUnavailable` if Redis is unreachable.
    #[tracing::instrument(skip(self), fields(category = %category.as_str()))]
    pub async fn check(
        &self,
        category: RateLimitCategory,
        identifier: &str,
    ) -> Result<RateLimitResult, RateLimitError> {
        if !self.config.enabled {
            return Ok(RateLimitResult::unlimited());
        }

        if self.is_allowed_by_config(identifier) {
            debug!(ip = %identifier, "IP in allowlist, bypassing rate limit");
            return Ok(RateLimitResult::unlimited());
        }

        let limit_config = self.get_limit_config(category);
        let key = self.build_key(category.as_str(), identifier);
        let args = vec![
            limit_config.window_secs.to_string(),
            limit_config.requests.to_string(),
        ];

        let result = self
            .execute_script(Script::RateLimit, vec![key], args)
            .await?;

        Ok(Self::to_result(&result, limit_config, unix_now()))
    }

    /// Builds a `RateLimitResult` from the `{count, allowed, ttl}` script reply.
    fn to_result(reply: &[i64], limit_config: &LimitConfig, now: u64) -> RateLimitResult {
        let count = reply.first().copied().unwrap_or(0).max(0) as u32;
        let allowed = reply.get(1).copied() == Some(SCRIPT_ALLOWED);
        let ttl = reply.get(2).copied().unwrap_or(0).max(0) as u64;

        RateLimitResult {
            allowed,
            limit: limit_config.requests,
            remaining: if allowed {
                limit_config.requests.saturating_sub(count)
            } else {
                0
            },
            reset_at: now + ttl,
            retry_after: if allowed { 0 } else { ttl },
        }
    }

    /// Executes an embedded script by SHA, reloading scripts once on NOSCRIPT.
    async fn execute_script(
        &self,
        script: Script,
        keys: Vec<String>,
        args: Vec<String>,
    ) -> Result<Vec<i64>, RateLimitError> {
        let sha = self.script_sha(script).await;

        let result: Result<Vec<i64>, Error> = self
            .bounded(self.redis.evalsha(&sha, keys.clone(), args.clone()))
            .await;

        match result {
            Ok(r) => Ok(r),
            Err(e) if Self::is_noscript_error(&e) => {
                warn!("NOSCRIPT error, reloading Lua scripts");
                self.load_scripts().await.map_err(|e| {
                    warn!(error = %e, "Failed to reload scripts");
                    RateLimitError::RedisUnavailable
                })?;

                let new_sha = self.script_sha(script).await;
                self.bounded(self.redis.evalsha(&new_sha, keys, args))
                    .await
                    .map_err(|e| {
                        warn!(error = %e, "Redis script failed after reload");
                        RateLimitError::RedisUnavailable
                    })
            }
            Err(e) => {
                warn!(error = %e, "Redis rate limit script failed");
                Err(RateLimitError::RedisUnavailable)
            }
        }
    }

    async fn script_sha(&self, script: Script) -> String {
        let scripts = self.scripts.read().await;
        match script {
            Script::RateLimit => scripts.rate_limit.clone(),
            Script::FailedVerification => scripts.failed_verification.clone(),
        }
    }

    /// Checks if the identifier is in the allowlist configuration.
    pub fn is_allowed_by_config(&self, identifier: &str) -> bool {
        self.config.allowlist.contains(identifier)
    }

    /// Records a failed verify-token or signature check for the given IP.
    ///
    /// Returns `Ok(true)` if the IP is blocked after this failure.
    #[tracing::instrument(skip(self))]
    pub async fn record_failed_verification(&self, ip: &str) -> Result<bool, RateLimitError> {
        if !self.config.enabled || self.is_allowed_by_config(ip) {
            return Ok(false);
        }

        let failed_key = self.build_key(RateLimitCategory::FailedVerification.as_str(), ip);
        let block_key = self.build_key("blocked", ip);
        let config: &FailedVerificationConfig = &self.config.limits.failed_verification;

        let result = self
            .execute_script(
                Script::FailedVerification,
                vec![failed_key, block_key],
                vec![
                    config.window_secs.to_string(),
                    config.max_failures.to_string(),
                    config.block_duration_secs.to_string(),
                ],
            )
            .await?;

        let count = result.first().copied().unwrap_or(0);
        let is_blocked = result.get(1).copied() == Some(SCRIPT_ALLOWED);
        let is_newly_blocked = result.get(2).copied() == Some(SCRIPT_ALLOWED);

        if is_newly_blocked {
            warn!(
                ip = %ip,
                failures = count,
                block_duration = config.block_duration_secs,
                "IP blocked due to repeated verification failures"
            );
        } else {
            debug!(
                ip = %ip,
                failures = count,
                max_failures = config.max_failures,
                is_blocked = is_blocked,
                "Verification failure recorded"
            );
        }

        Ok(is_blocked)
    }

    /// Checks if the given IP address is currently blocked.
    #[tracing::instrument(skip(self))]
    pub async fn is_blocked(&self, ip: &str) -> Result<bool, RateLimitError> {
        if !self.config.enabled || self.is_allowed_by_config(ip) {
            return Ok(false);
        }

        let key = self.build_key("blocked", ip);
        let exists: bool = self.bounded(self.redis.exists(&key)).await.map_err(|e| {
            warn!(error = %e, "Failed to check IP block status");
            RateLimitError::RedisUnavailable
        })?;

        if exists {
            debug!(ip = %ip, "IP is blocked");
        }

        Ok(exists)
    }

    /// Returns the remaining block time in seconds for a blocked IP.
    pub async fn get_block_ttl(&self, ip: &str) -> Option<u64> {
        if !self.config.enabled {
            return None;
        }

        let key = self.build_key("blocked", ip);
        let ttl: i64 = self.bounded(self.redis.ttl(&key)).await.ok()?;

        (ttl > 0).then_some(ttl as u64)
    }

    /// Returns the configuration for this rate limiter.
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Builds a Redis key with the configured prefix.
    fn build_key(&self, category: &str, identifier: &str) -> String {
        format!(
            "{}:{}:{}",
            self.config.redis_key_prefix, category, identifier
        )
    }

    /// Returns the limit configuration for a given category.
    fn get_limit_config(&self, category: RateLimitCategory) -> &LimitConfig {
        match category {
            RateLimitCategory::WebhookEvent => &self.config.limits.webhook_event,
            RateLimitCategory::WebhookVerify | RateLimitCategory::FailedVerification => {
                &self.config.limits.webhook_verify
            }
        }
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn mock_config() -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            redis_key_prefix: "test:rl".to_string(),
            fail_open: true,
            trust_proxy: false,
            allowlist: HashSet::from(["127.0.0.1".to_string()]),
            ..Default::default()
        }
    }

    fn create_mock_limiter(config: RateLimitConfig) -> RateLimiter {
        RateLimiter {
            redis: create_mock_client(),
            config: Arc::new(config),
            scripts: Arc::new(RwLock::new(ScriptShas::default())),
        }
    }

    #[test]
    fn test_build_key() {
        let limiter = create_mock_limiter(mock_config());

        let key = limiter.build_key("webhook_event", "192.168.1.1");
        assert_eq!(key, "test:rl:webhook_event:192.168.1.1");
    }

    #[test]
    fn test_is_allowed_by_config() {
        let limiter = create_mock_limiter(mock_config());

        assert!(limiter.is_allowed_by_config("127.0.0.1"));
        assert!(!limiter.is_allowed_by_config("192.168.1.1"));
    }

    #[test]
    fn test_get_limit_config() {
        let limiter = create_mock_limiter(mock_config());

        let event = limiter.get_limit_config(RateLimitCategory::WebhookEvent);
        assert_eq!(event.requests, 30);
        assert_eq!(event.window_secs, 60);

        let verify = limiter.get_limit_config(RateLimitCategory::WebhookVerify);
        assert_eq!(verify.requests, 10);
    }

    #[test]
    fn test_to_result_allowed() {
        let limit = LimitConfig { requests: 30, window_secs: 60 };
        let result = RateLimiter::to_result(&[5, 1, 42], &limit, 1000);
        assert!(result.allowed);
        assert_eq!(result.remaining, 25);
        assert_eq!(result.reset_at, 1042);
        assert_eq!(result.retry_after, 0);
    }

    #[test]
    fn test_to_result_denied() {
        let limit = LimitConfig { requests: 30, window_secs: 60 };
        let result = RateLimiter::to_result(&[31, 0, 17], &limit, 1000);
        assert!(!result.allowed);
        assert_eq!(result.remaining, 0);
        assert_eq!(result.retry_after, 17);
    }

    #[test]
    fn test_failure_script_blocks_past_threshold() {
        assert!(FAILED_VERIFICATION_SCRIPT.contains("if count > tonumber(ARGV[2]) then"));
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_unavailable() {
        let config = RateLimitConfig {
            command_timeout: std::time::Duration::from_millis(100),
            ..mock_config()
        };
        let limiter = create_mock_limiter(config);

        let result = limiter.check(RateLimitCategory::WebhookEvent, "10.0.0.1").await;
        assert!(matches!(result, Err(RateLimitError::RedisUnavailable)));
        assert!(matches!(
            limiter.is_blocked("10.0.0.1").await,
            Err(RateLimitError::RedisUnavailable)
        ));
    }

    #[tokio::test]
    async fn test_disabled_limiter_allows_without_redis() {
        let config = RateLimitConfig {
            enabled: false,
            ..mock_config()
        };
        let limiter = create_mock_limiter(config);

        let result = limiter
            .check(RateLimitCategory::WebhookEvent, "10.0.0.1")
            .await
            .unwrap();
        assert!(result.allowed);
        assert!(!limiter.record_failed_verification("10.0.0.1").await.unwrap());
        assert!(!limiter.is_blocked("10.0.0.1").await.unwrap());
    }

    /// Helper to create a mock Redis client for tests that don't need actual Redis.
    fn create_mock_client() -> Client {
        let config = Config::from_url("redis://127.0.0.1:1").unwrap();
        Client::new(config, None, None, None)
    }
}
