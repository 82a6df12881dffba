//! Hop-by-hop and forwarding header handling

use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use std::net::SocketAddr;
use switchyard_core::{X_FORWARDED_FOR, X_FORWARDED_HOST, X_FORWARDED_PROTO};

/// Headers that describe a single transport hop and are never forwarded
const HOP_BY_HOP: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Check if a header is a hop-by-hop header that should not be forwarded
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Header names listed in the `Connection` header(s)
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// Whether the message asks to switch protocols
///
/// Requires an `Upgrade` header and an `upgrade` token in `Connection`.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers.contains_key(header::UPGRADE)
        && connection_tokens(headers).iter().any(|token| token == "upgrade")
}

/// Remove hop-by-hop headers, including any named in `Connection`
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for token in connection_tokens(headers) {
        if let Ok(name) = HeaderName::from_bytes(token.as_bytes()) {
            headers.remove(name);
        }
    }

    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Re-add the headers that carry an upgrade across the hop
pub fn set_upgrade(headers: &mut HeaderMap, protocol: HeaderValue) {
    headers.insert(header::CONNECTION, HeaderValue::from_static("upgrade"));
    headers.insert(header::UPGRADE, protocol);
}

/// Append the client to `X-Forwarded-For` and set the proto/host headers
///
/// An existing `X-Forwarded-Host` from an earlier proxy is kept.
pub fn add_forwarded_headers(
    headers: &mut HeaderMap,
    client_addr: SocketAddr,
    original_host: Option<&HeaderValue>,
) {
    let client_ip = client_addr.ip().to_string();

    let chain = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    let forwarded_for = if chain.is_empty() {
        client_ip
    } else {
        format!("{chain}, {client_ip}")
    };

    match HeaderValue::from_str(&forwarded_for) {
        Ok(value) => {
            headers.insert(X_FORWARDED_FOR, value);
        }
        Err(_) => {
            tracing::debug!(client = %client_addr, "Dropping unparseable X-Forwarded-For chain");
            if let Ok(value) = HeaderValue::from_str(&client_addr.ip().to_string()) {
                headers.insert(X_FORWARDED_FOR, value);
            }
        }
    }

    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

    if let Some(host) = original_host {
        if !headers.contains_key(X_FORWARDED_HOST) {
            headers.insert(X_FORWARDED_HOST, host.clone());
        }
    }
}
