//! Error information-disclosure tests.
//!
//! `Error::into_response` replaces the message of every 5xx error except
//! upstream failures with a generic one.

use http_body_util::BodyExt;
use subhub::Error;

fn body(err: Error) -> (u16, String) {
    let resp = err.into_response();
    let status = resp.status().as_u16();
    let bytes = tokio_test::block_on(resp.into_body().collect())
        .unwrap()
        .to_bytes();
    (status, String::from_utf8_lossy(&bytes).into_owned())
}

#[test]
fn internal_error_hides_sql() {
    let (status, body) =
        body(Error::Internal("Failed to query SELECT * FROM users WHERE id = 'x'".into()));
    assert_eq!(status, 500);
    assert!(!body.contains("SELECT"), "SQL fragment leaked to client: {body}");
    assert!(body.contains("Internal server error"), "{body}");
}

#[test]
fn io_error_hides_paths() {
    let io_err = std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "No such file: /etc/secret/config.toml",
    );
    let (status, body) = body(Error::Io(io_err));
    assert_eq!(status, 500);
    assert!(!body.contains("/etc/secret"), "Filesystem path leaked to client: {body}");
}

#[test]
fn config_error_hides_detail() {
    let (_, body) = body(Error::Config("JWT secret must be at least 32 bytes".into()));
    assert!(!body.contains("JWT"), "{body}");
}

#[test]
fn client_errors_keep_their_message() {
    let (status, body) = body(Error::NotFound("Subscription not found".into()));
    assert_eq!(status, 404);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["code"], 404);
    assert_eq!(json["message"], "Subscription not found");
    assert!(json["data"].is_null());
}

#[test]
fn upstream_failure_is_503_with_its_message() {
    let (status, body) = body(Error::Upstream("Failed to fetch subscription data".into()));
    assert_eq!(status, 503);
    assert!(body.contains("Failed to fetch subscription data"));
}
