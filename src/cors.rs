//! Cross-origin request policy.
//!
//! Requests without an `Origin` header are not cross-origin and pass
//! untouched. Otherwise the origin must be `http://<host>` or
//! `https://<host>` for the request's own host, unless the server runs with
//! `cors_permissive`, which allows any origin with `*`.

use hyper::http::{HeaderMap, HeaderValue, Uri, header};

use crate::config;

pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const ALLOW_HEADERS: &str =
    "Origin, Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, Authorization";

/// Outcome of checking a request against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No `Origin` header.
    Pass,
    /// Allowed. Carries the `Access-Control-Allow-Origin` value.
    Allow(HeaderValue),
    Reject,
}

/// Decide whether a request may proceed.
pub fn check(server: &config::Server, headers: &HeaderMap, uri: &Uri) -> Decision {
    let Some(origin) = headers.get(header::ORIGIN) else {
        return Decision::Pass;
    };
    if server.cors_permissive {
        return Decision::Allow(HeaderValue::from_static("*"));
    }

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()));
    let same_origin = match (origin.to_str(), host) {
        (Ok(origin), Some(host)) => origin
            .strip_prefix("http://")
            .or_else(|| origin.strip_prefix("https://"))
            .is_some_and(|rest| rest.eq_ignore_ascii_case(host)),
        _ => false,
    };

    if same_origin {
        Decision::Allow(origin.clone())
    } else {
        Decision::Reject
    }
}

/// Add the allow headers for an accepted cross-origin request.
pub fn apply(headers: &mut HeaderMap, allow_origin: HeaderValue) {
    let wildcard = allow_origin.as_bytes() == b"*";
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOW_HEADERS),
    );
    if !wildcard {
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}
