//! Redis-backed rate limiting for the webhook endpoints.
//!
//! Fixed-window counters per category and client address, plus temporary
//! blocks for addresses that keep failing verification.

pub mod config;
pub mod constants;
pub mod error;
pub mod ip;
pub mod limiter;
pub mod middleware;
pub mod types;

pub use config::*;
pub use constants::*;
pub use error::*;
pub use ip::*;
pub use limiter::*;
pub use middleware::{
    check_ip_not_blocked, rate_limit_by_ip, record_verification_failure, request_ip,
    with_category,
};
pub use types::*;
