//! Cookie extraction.
//!
//! The session token is looked up in the first `Cookie` header by splitting
//! it manually, then in every `Cookie` field the request carries (HTTP/2
//! clients may send one field per cookie). Both session checks and identity
//! resolution use this single lookup order.

use axum::http::{header, HeaderMap};

/// Name of the cookie holding the session token.
pub const SESSION_COOKIE: &str = "session_token";

/// Extract a non-empty cookie value by name.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| find_in_header(raw, name))
        .or_else(|| {
            headers
                .get_all(header::COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .find_map(|raw| find_in_header(raw, name))
        })
        .map(|value| unquote(&value).to_string())
        .filter(|value| !value.is_empty())
}

/// Extract the session token from the request's cookies.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    cookie_value(headers, SESSION_COOKIE)
}

/// Every `Cookie` field joined into one header value, as a browser would send it.
pub fn full_cookie_header(headers: &HeaderMap) -> Option<String> {
    let parts: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

fn find_in_header(raw: &str, name: &str) -> Option<String> {
    raw.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}
