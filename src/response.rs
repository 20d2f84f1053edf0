//! HTTP response builders.
//!
//! Provides convenient functions for building JSON responses.

use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Response body type used throughout taxiway.
pub type Body = Full<Bytes>;

/// Full response type used throughout taxiway.
pub type HttpResponse = Response<Body>;

/// Build a response with a fixed status, content type and body.
pub fn build(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Build a JSON response with the given status code and body.
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> crate::Result<HttpResponse> {
    let json = serde_json::to_vec(body)?;
    Ok(build(status, "application/json", Bytes::from(json)))
}

/// Build a 200 OK JSON response.
pub fn ok<T: Serialize>(body: &T) -> crate::Result<HttpResponse> {
    json(StatusCode::OK, body)
}

/// Build a body-less response.
pub fn empty(status: StatusCode) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Build a JSON error response with a fixed message.
pub fn error(status: StatusCode, message: &str) -> HttpResponse {
    let body = serde_json::json!({ "error": message });
    build(status, "application/json", Bytes::from(body.to_string()))
}

/// Build a 404 Not Found JSON response.
pub fn not_found(message: &str) -> HttpResponse {
    error(StatusCode::NOT_FOUND, message)
}

/// Build a 500 Internal Server Error JSON response.
pub fn internal_error(message: &str) -> HttpResponse {
    error(StatusCode::INTERNAL_SERVER_ERROR, message)
}
