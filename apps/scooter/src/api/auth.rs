//! # Authentication Module
//!
//! Scooter never verifies end-user credentials itself. An upstream identity
//! gateway does, then forwards the request with:
//!
//! ```text
//! Authorization: Bearer <gateway key>
//! X-User-Id: <stable user id>
//! X-User-Email: <email, optional>
//! ```
//!
//! The gateway key (when configured) proves the request came through the
//! gateway. The identity headers are then trusted as-is.

use super::AppState;
use super::error::ApiError;
use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, header, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use scooter_core::{Caller, ScooterError};
use subtle::ConstantTimeEq;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";

const MAX_USER_ID_LEN: usize = 128;

// =============================================================================
// GATEWAY KEY
// =============================================================================

/// Constant-time comparison over equal-length padded buffers.
fn keys_match(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();

    let max_len = provided.len().max(expected.len());
    let mut padded_provided = vec![0u8; max_len];
    let mut padded_expected = vec![0u8; max_len];
    padded_provided[..provided.len()].copy_from_slice(provided);
    padded_expected[..expected.len()].copy_from_slice(expected);

    let bytes_match: bool = padded_provided.ct_eq(&padded_expected).into();
    bytes_match && provided.len() == expected.len()
}

/// Reject requests that do not carry the configured gateway key.
///
/// `/health` is always allowed.
pub async fn gateway_auth_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(expected) = state.config.gateway_key.as_deref() else {
        return next.run(request).await;
    };
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match provided {
        Some(key) if keys_match(key, expected) => next.run(request).await,
        Some(_) => {
            tracing::warn!(
                event = "auth_failure",
                reason = "invalid_gateway_key",
                "Authentication failed: invalid gateway key"
            );
            ApiError(ScooterError::Unauthorized).into_response()
        }
        None => {
            tracing::warn!(
                event = "auth_failure",
                reason = "missing_authorization_header",
                "Missing Authorization header"
            );
            ApiError(ScooterError::Unauthorized).into_response()
        }
    }
}

// =============================================================================
// CALLER IDENTITY
// =============================================================================

/// Read the forwarded identity headers.
pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ScooterError> {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_USER_ID_LEN)
        .ok_or(ScooterError::Unauthorized)?;
    let email = headers
        .get(USER_EMAIL_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|e| !e.trim().is_empty());
    Ok(Caller::new(user_id, email))
}

/// The authenticated caller of a request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Caller);

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        caller_from_headers(&parts.headers).map(CurrentUser).map_err(ApiError)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn key_comparison_checks_length() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secret\0", "secret"));
        assert!(!keys_match("secre", "secret"));
        assert!(!keys_match("", "secret"));
    }

    #[test]
    fn identity_requires_user_id() {
        let mut headers = HeaderMap::new();
        assert!(matches!(
            caller_from_headers(&headers),
            Err(ScooterError::Unauthorized)
        ));

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("  "));
        assert!(caller_from_headers(&headers).is_err());

        headers.insert(USER_ID_HEADER, HeaderValue::from_static("u-1"));
        headers.insert(USER_EMAIL_HEADER, HeaderValue::from_static(" Ann@Example.com "));
        let caller = caller_from_headers(&headers).expect("caller");
        assert_eq!(caller.user_id.as_str(), "u-1");
        assert_eq!(caller.email.as_deref(), Some("ann@example.com"));
    }
}
