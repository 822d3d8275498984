//! Client address extraction from HTTP requests.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Returns the key a request is rate limited under.
///
/// With `behind_proxy` unset only the socket peer address is used, since any
/// client can forge forwarding headers. Behind a trusted proxy the lookup order is:
///
/// 1. First parsable address in `X-Forwarded-For`
/// 2. `X-Real-IP`
/// 3. The socket peer address
///
/// # Examples
///
/// ```ignore
/// let mut headers = HeaderMap::new();
/// headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
///
/// let ip = client_ip(&headers, peer, true);
/// assert_eq!(ip.to_string(), "203.0.113.7");
/// ```
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr, behind_proxy: bool) -> IpAddr {
    if behind_proxy {
        if let Some(ip) = forwarded_for(headers) {
            return ip;
        }
        if let Some(ip) = header_ip(headers, X_REAL_IP) {
            return ip;
        }
    }

    peer.ip()
}

fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get(X_FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .find_map(|part| part.trim().parse().ok())
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
