//! Admin token gate.
//!
//! A single shared secret compared by string equality — no sessions, no
//! expiry. Known weakness, kept deliberately (see DESIGN.md); every
//! admin-facing handler must pass this gate before touching the store.

use axum::http::HeaderMap;

use crate::config::Config;
use crate::errors::AppError;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Plain equality check of a supplied token against the configured secret.
/// Empty supplied tokens never match.
pub fn token_matches(supplied: &str, expected: &str) -> bool {
    !supplied.is_empty() && supplied == expected
}

/// Rejects the request with 401 unless the `x-admin-token` header carries
/// the configured admin secret.
pub fn require_admin(headers: &HeaderMap, config: &Config) -> Result<(), AppError> {
    let supplied = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if token_matches(supplied, &config.admin_token) {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}
