//! JWT and authentication tests.
//!
//! Verifies token signing, algorithm handling, secret strength,
//! and RFC 7235 compliance for Bearer token extraction.

use subhub::auth;
use subhub::config::Auth as AuthConfig;

fn config(secret: &str) -> AuthConfig {
    AuthConfig {
        jwt_secret: secret.to_string(),
        token_expiry_hours: 24,
    }
}

/// The JWT layer rejects secrets shorter than 32 bytes.
#[test]
fn rejects_short_secret() {
    assert!(auth::create_token(&config("x"), 1).is_err());
    assert!(auth::create_token(&config(""), 1).is_err());
}

/// `Validation::default()` restricts to HS256, so a token forged with
/// `"alg":"none"` must be rejected.
#[test]
fn rejects_none_algorithm_token() {
    use base64::Engine;
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let header = engine.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let payload = engine.encode(
        serde_json::json!({"user_id": 1, "exp": 9999999999i64, "iat": 1700000000})
            .to_string(),
    );
    let forged = format!("{header}.{payload}.");

    let err = auth::verify_token(&config("real_secret_that_is_at_least_32b!"), &forged).unwrap_err();
    assert!(matches!(err, subhub::Error::Unauthorized));
}

/// Rotating the signing key invalidates all outstanding tokens.
#[test]
fn key_rotation_invalidates_old_tokens() {
    let old = config("old_secret_key_production_32byte!");
    let new = config("new_secret_key_production_32byte!");
    let token = auth::create_token(&old, 7).unwrap();
    assert!(auth::verify_token(&new, &token.value).is_err());
    assert_eq!(auth::verify_token(&old, &token.value).unwrap().user_id, 7);
}

#[test]
fn token_expiry_follows_config() {
    let config = AuthConfig {
        jwt_secret: "expiry_secret_that_is_at_least_32b".to_string(),
        token_expiry_hours: 2,
    };
    let token = auth::create_token(&config, 1).unwrap();
    let claims = auth::verify_token(&config, &token.value).unwrap();
    assert_eq!(claims.exp - claims.iat, 2 * 3600);
    assert_eq!(claims.exp, token.expires_at.as_second());
}

/// RFC 7235: the auth-scheme in `Authorization: Bearer <tok>` is
/// case-insensitive.
#[test]
fn bearer_scheme_is_case_insensitive() {
    let config = config("test_secret_that_is_at_least_32b!");
    let token = auth::create_token(&config, 42).unwrap();

    for scheme in ["Bearer", "bearer", "BEARER"] {
        let mut headers = hyper::http::HeaderMap::new();
        headers.insert(
            "Authorization",
            format!("{scheme} {}", token.value).parse().unwrap(),
        );
        assert_eq!(auth::extract_user_id(&headers, &config).unwrap(), 42, "{scheme}");
    }

    let mut headers = hyper::http::HeaderMap::new();
    headers.insert("Authorization", format!("Token {}", token.value).parse().unwrap());
    assert!(auth::extract_user_id(&headers, &config).is_err());
}
