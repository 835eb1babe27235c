//! Rate limiting types.

/// Categories for rate limiting with different thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitCategory {
    /// Event deliveries (`POST /webhook`)
    WebhookEvent,
    /// Verification handshakes (`GET /webhook`)
    WebhookVerify,
    /// Failed token/signature checks (for IP blocking)
    FailedVerification,
}

impl RateLimitCategory {
    /// Returns the string identifier for this category (used in Redis keys).
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::WebhookEvent => "webhook_event",
            Self::WebhookVerify => "webhook_verify",
            Self::FailedVerification => "failed_verification",
        }
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub struct RateLimitResult {
    /// Whether the request is allowed
    pub allowed: bool,
    /// Maximum requests allowed in the window
    pub limit: u32,
    /// Remaining requests in the current window
    pub remaining: u32,
    /// Unix timestamp when the window resets
    pub reset_at: u64,
    /// Seconds to wait before retrying (0 if allowed)
    pub retry_after: u64,
}

impl RateLimitResult {
    /// Result for requests that bypass the limiter.
    pub const fn unlimited() -> Self {
        Self {
            allowed: true,
            limit: 0,
            remaining: 0,
            reset_at: 0,
            retry_after: 0,
        }
    }
}

/// Normalized IP address stored in request extensions.
///
/// IPv4 addresses are stored as-is.
/// IPv6 addresses are normalized to /64 prefix for rate limiting.
#[derive(Debug, Clone)]
pub struct NormalizedIp(pub String);

/// Marks a request whose body signature was verified.
///
/// Verification-failure blocks do not apply to such requests.
#[derive(Debug, Clone, Copy)]
pub struct VerifiedSender;
