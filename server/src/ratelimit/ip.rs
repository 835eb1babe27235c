//! Client address resolution for per-IP limits.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::HeaderMap;

use crate::ratelimit::constants::IPV6_PREFIX_SEGMENTS;
use crate::ratelimit::NormalizedIp;

const FORWARDED_FOR: &str = "X-Forwarded-For";
const REAL_IP: &str = "X-Real-IP";

/// Parses the last address of a (possibly comma separated) header value.
///
/// The trusted proxy appends the peer it saw, so only the right-most hop is
/// outside the caller's control.
fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers
        .get(name)?
        .to_str()
        .ok()?
        .rsplit(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

/// Resolves the caller's address.
///
/// Proxy headers are only consulted when `trust_proxy` is set, with
/// `X-Forwarded-For` winning over `X-Real-IP`. Without a socket address the
/// loopback address is used.
pub fn extract_client_ip(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> IpAddr {
    let proxied = trust_proxy
        .then(|| header_ip(headers, FORWARDED_FOR).or_else(|| header_ip(headers, REAL_IP)))
        .flatten();

    proxied
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Reduces an address to the key used for counting.
///
/// IPv6 callers share one bucket per /64, since a single allocation can rotate
/// through the whole suffix.
pub fn normalize_ip(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => {
            let prefix = v6.segments()[..IPV6_PREFIX_SEGMENTS]
                .iter()
                .map(|s| format!("{s:x}"))
                .collect::<Vec<_>>()
                .join(":");
            format!("{prefix}::/64")
        }
    }
}

/// Resolves and normalizes in one step.
pub fn client_key(
    headers: &HeaderMap,
    connect_info: Option<&ConnectInfo<SocketAddr>>,
    trust_proxy: bool,
) -> NormalizedIp {
    NormalizedIp(normalize_ip(extract_client_ip(
        headers,
        connect_info,
        trust_proxy,
    )))
}
