//! JWT token creation and verification.
//!
//! Tokens are HS256-signed and carry the numeric user id in a `user_id`
//! claim. Password hashing lives in [`crate::user`].

use hyper::http::HeaderMap;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::config::{Auth as AuthConfig, MIN_SECRET_LEN};
use crate::error::{Error, Result};

fn validate_secret(config: &AuthConfig) -> Result<()> {
    if config.jwt_secret.len() < MIN_SECRET_LEN {
        return Err(Error::Config(format!(
            "JWT secret must be at least {MIN_SECRET_LEN} bytes"
        )));
    }
    Ok(())
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// A signed token and the moment it stops being accepted.
#[derive(Debug, Clone)]
pub struct Token {
    pub value: String,
    pub expires_at: jiff::Timestamp,
}

/// Create a JWT token for a user.
pub fn create_token(config: &AuthConfig, user_id: i64) -> Result<Token> {
    validate_secret(config)?;
    let now = jiff::Timestamp::now();
    let expires_at = now
        .checked_add(jiff::Span::new().hours(i64::from(config.token_expiry_hours)))
        .map_err(|e| Error::Internal(format!("Token expiry out of range: {e}")))?;

    let claims = Claims {
        user_id,
        exp: expires_at.as_second(),
        iat: now.as_second(),
    };

    let value = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Token creation failed: {e}")))?;

    Ok(Token { value, expires_at })
}

/// Verify and decode a JWT token.
///
/// # Returns
/// - `Ok(Claims)` if the token is valid
/// - `Err(Error::TokenExpired)` if the token has expired
/// - `Err(Error::Unauthorized)` for any other validation failure
pub fn verify_token(config: &AuthConfig, token: &str) -> Result<Claims> {
    validate_secret(config)?;
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::TokenExpired,
        _ => {
            tracing::debug!("JWT rejected: {e}");
            Error::Unauthorized
        }
    })?;

    Ok(token_data.claims)
}

/// Extract the user id from an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively.
pub fn extract_user_id(headers: &HeaderMap, config: &AuthConfig) -> Result<i64> {
    let auth_header = headers
        .get(hyper::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(Error::Unauthorized)?;

    let token = auth_header
        .get(..7)
        .filter(|p| p.eq_ignore_ascii_case("bearer "))
        .map(|_| auth_header[7..].trim())
        .filter(|t| !t.is_empty())
        .ok_or(Error::Unauthorized)?;

    let claims = verify_token(config, token)?;

    Ok(claims.user_id)
}
