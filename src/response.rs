//! HTTP response builders.
//!
//! Every JSON body uses the same envelope:
//! `{"code": <status>, "message": <text>, "data": <payload or null>}`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Response body type used throughout subhub.
pub type Body = Full<Bytes>;

/// Full response type used throughout subhub.
pub type HttpResponse = Response<Body>;

/// The JSON envelope wrapped around every API payload.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub code: u16,
    pub message: &'a str,
    pub data: T,
}

/// Build a JSON response with the given status code and body.
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> crate::Result<HttpResponse> {
    let json = serde_json::to_string(body)?;
    Ok(build(status, "application/json", Bytes::from(json)))
}

/// Build an enveloped response carrying `data`.
pub fn success<T: Serialize>(
    status: StatusCode,
    message: &str,
    data: &T,
) -> crate::Result<HttpResponse> {
    json(
        status,
        &Envelope {
            code: status.as_u16(),
            message,
            data,
        },
    )
}

/// Build a 200 OK enveloped response.
pub fn ok<T: Serialize>(message: &str, data: &T) -> crate::Result<HttpResponse> {
    success(StatusCode::OK, message, data)
}

/// Build a 201 Created enveloped response.
pub fn created<T: Serialize>(message: &str, data: &T) -> crate::Result<HttpResponse> {
    success(StatusCode::CREATED, message, data)
}

/// Build an enveloped response with `"data": null`.
pub fn message(status: StatusCode, message: &str) -> HttpResponse {
    let body = serde_json::json!({
        "code": status.as_u16(),
        "message": message,
        "data": null,
    });
    build(status, "application/json", Bytes::from(body.to_string()))
}

/// Build an error response. Same shape as [`message`]; kept separate so call
/// sites read as what they are.
pub fn error(status: StatusCode, message: &str) -> HttpResponse {
    self::message(status, message)
}

/// Build a 204 No Content response.
pub fn no_content() -> HttpResponse {
    Response::builder()
        .status(StatusCode::NO_CONTENT)
        .body(Full::new(Bytes::new()))
        .unwrap()
}

/// Build a 200 response for a static file.
pub fn file(data: Bytes, content_type: &str) -> HttpResponse {
    build(StatusCode::OK, content_type, data)
}

fn build(status: StatusCode, content_type: &str, body: Bytes) -> HttpResponse {
    Response::builder()
        .status(status)
        .header("Content-Type", content_type)
        .body(Full::new(body))
        .unwrap()
}
