//! Error types with HTTP status code mapping.

use hyper::StatusCode;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::response::{self, HttpResponse};
use crate::schema::Issue;

/// Error type for taxiway operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth errors
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Token expired")]
    TokenExpired,

    // Data errors
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<Issue>),

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Handler contract errors
    #[error("Response does not match schema {schema}")]
    ResponseShape { schema: String, issues: Vec<Issue> },

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

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(rename = "ErrorResponse")]
pub struct Body {
    /// Human-readable message. Server errors always carry a generic message.
    pub error: String,
    /// Field-level mismatches, present on validation failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
}

impl Error {
    /// Map error to HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Unauthorized | Error::TokenExpired => StatusCode::UNAUTHORIZED,

            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::BadRequest(_) | Error::Validation(_) | Error::AddrParse(_) => {
                StatusCode::BAD_REQUEST
            }

            // Config errors -> 500 (shouldn't happen at runtime)
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,

            Error::ResponseShape { .. }
            | Error::Io(_)
            | Error::Json(_)
            | Error::Database(_)
            | Error::Jwt(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert error into HTTP response.
    pub fn into_response(self) -> HttpResponse {
        let status = self.status_code();
        let body = if status.is_server_error() {
            tracing::error!("Internal error: {self}");
            Body {
                error: "Internal server error".to_string(),
                issues: Vec::new(),
            }
        } else {
            let error = self.to_string();
            let issues = match self {
                Error::Validation(issues) => issues,
                _ => Vec::new(),
            };
            Body { error, issues }
        };

        match serde_json::to_vec(&body) {
            Ok(json) => response::build(status, "application/json", json.into()),
            Err(_) => response::internal_error("Internal server error"),
        }
    }
}

/// Result type alias using taxiway's Error.
pub type Result<T> = std::result::Result<T, Error>;
