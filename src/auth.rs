//! JWT authentication utilities and the access-control step.
//!
//! Token issuance and verification live here. Routes are access-controlled
//! by placing [`can_access`] in their middleware list; the step carries the
//! `requires_auth` capability, which is what marks the route as secured in
//! the API documentation.

use hyper::http::HeaderMap;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Auth as AuthConfig;
use crate::error::{Error, Result};
use crate::middleware::{Middleware, Next, Reply};
use crate::router::Context;

const MIN_SECRET_LENGTH: usize = 32;

fn validate_secret(config: &AuthConfig) -> Result<()> {
    if config.jwt_secret.len() < MIN_SECRET_LENGTH {
        return Err(Error::Config(format!(
            "JWT secret must be at least {MIN_SECRET_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (typically user ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Create a JWT token for a user.
///
/// # Arguments
/// * `config` - Auth configuration with JWT secret and expiry settings
/// * `user_id` - The user ID to encode in the token's `sub` claim
pub fn create_token(config: &AuthConfig, user_id: &str) -> Result<String> {
    validate_secret(config)?;
    let now = jiff::Timestamp::now();
    let hours = config.token_expiry_days as i64 * 24;
    let exp = now + jiff::Span::new().hours(hours);

    let claims = Claims {
        sub: user_id.to_string(),
        exp: exp.as_second(),
        iat: now.as_second(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Token creation failed: {e}")))?;

    Ok(token)
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
        _ => Error::Unauthorized,
    })?;

    Ok(token_data.claims)
}

/// Extract user ID from the Authorization header.
///
/// Expects a Bearer token in the format: `Authorization: Bearer <token>`
///
/// # Returns
/// - `Ok(user_id)` if the token is valid
/// - `Err(Error::Unauthorized)` if the header is missing or token is invalid
pub fn extract_user_id(headers: &HeaderMap, config: &AuthConfig) -> Result<String> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or(Error::Unauthorized)?;

    let token = auth_header
        .get(..7)
        .filter(|p| p.eq_ignore_ascii_case("bearer "))
        .map(|_| &auth_header[7..])
        .ok_or(Error::Unauthorized)?;

    let claims = verify_token(config, token)?;

    Ok(claims.sub)
}

/// The access-control step: requires a valid bearer token and records its
/// subject on [`Context::user`].
pub fn can_access() -> Middleware {
    Middleware::from_fn(check_access).named("can_access").requiring_auth()
}

async fn check_access(mut ctx: Context, next: Next) -> Result<Reply> {
    let user = extract_user_id(&ctx.headers, &ctx.config.auth).inspect_err(|e| {
        debug!(path = %ctx.uri.path(), "Access denied: {e}");
    })?;
    ctx.user = Some(user);
    next.run(ctx).await
}
