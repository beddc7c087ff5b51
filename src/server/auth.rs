//! API key authentication.

use crate::config::AuthConfig;
use crate::error::Error;
use crate::server::error::AppError;
use crate::server::AppContext;
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;

/// Header carrying the shared API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Check the presented key against the configured one.
///
/// Always passes when no key is configured.
pub fn check_api_key(auth_config: &AuthConfig, presented: Option<&str>) -> Result<(), Error> {
    let Some(ref expected) = auth_config.api_key else {
        return Ok(());
    };

    match presented {
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => Ok(()),
        _ => Err(Error::Unauthorized("Invalid API Key".to_string())),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

/// Middleware for API key authentication
pub async fn api_key_middleware(
    State(ctx): State<AppContext>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    check_api_key(&ctx.config.auth, presented_key(request.headers()))?;
    Ok(next.run(request).await)
}
