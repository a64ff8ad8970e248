//! Header plumbing for forwarded requests

use std::net::IpAddr;

use axum::http::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, HOST};

/// Connection-scoped headers that never cross the proxy
pub const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Copy every end-to-end header, keeping repeated values
pub fn end_to_end_headers(headers: &HeaderMap) -> HeaderMap {
    let mut filtered = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

/// Headers for the backend request
///
/// `Host` and `Content-Length` are left for the client to derive from the
/// backend URL and the buffered body.
pub fn outbound_headers(headers: &HeaderMap, client: Option<IpAddr>) -> HeaderMap {
    let mut outbound = end_to_end_headers(headers);
    outbound.remove(HOST);
    outbound.remove(CONTENT_LENGTH);
    if let Some(ip) = client {
        append_forwarded_for(&mut outbound, ip);
    }
    outbound
}

/// Append the client address to `X-Forwarded-For`, joining prior hops
pub fn append_forwarded_for(headers: &mut HeaderMap, client: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .collect();

    let chain = if prior.is_empty() {
        client.to_string()
    } else {
        format!("{}, {}", prior.join(", "), client)
    };

    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
