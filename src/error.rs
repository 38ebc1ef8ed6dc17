//! Error types with HTTP status code mapping.

use hyper::StatusCode;

use crate::response::{self, HttpResponse};
use crate::route::ValidationError;

/// Error type for subhub operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth errors
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Token expired")]
    TokenExpired,

    #[error("{0}")]
    Forbidden(String),

    // Data errors
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Payload too large")]
    PayloadTooLarge,

    /// An outbound fetch failed. The message is safe to show to clients.
    #[error("{0}")]
    Upstream(String),

    // Registration errors
    #[error("invalid route from {origin}: {error}")]
    InvalidRoute {
        origin: String,
        #[source]
        error: ValidationError,
    },

    #[error("invalid route in group {group} from {origin}: {error}")]
    InvalidGroupRoute {
        group: String,
        origin: String,
        #[source]
        error: ValidationError,
    },

    #[error("Route conflict: {0}")]
    RouteConflict(String),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // System errors
    #[error("Invalid address: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Password hashing failed: {0}")]
    PasswordHash(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Auth errors -> 401/403
            Error::Unauthorized | Error::InvalidCredentials | Error::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
            Error::Forbidden(_) => StatusCode::FORBIDDEN,

            // Data errors -> 4xx
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            Error::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,

            // Startup errors -> 500 (shouldn't happen at runtime)
            Error::InvalidRoute { .. }
            | Error::InvalidGroupRoute { .. }
            | Error::RouteConflict(_)
            | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // System errors -> 500
            Error::AddrParse(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Database(_)
            | Error::Jwt(_)
            | Error::Http(_)
            | Error::PasswordHash(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert error into an HTTP response carrying the JSON envelope.
    pub fn into_response(self) -> HttpResponse {
        let status = self.status_code();
        let message = match &self {
            Error::Upstream(message) => message.clone(),
            _ if status.is_server_error() => {
                tracing::error!("Internal error: {self}");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };
        response::error(status, &message)
    }
}

/// Result type alias using subhub's Error.
pub type Result<T> = std::result::Result<T, Error>;
