//! # API Errors
//!
//! Every failure is answered with a non-2xx status and a `{"message": ...}`
//! body. Server-side failures are logged in full and answered with a generic
//! message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use scooter_core::ScooterError;
use serde::{Deserialize, Serialize};

/// Error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

/// A core error on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub ScooterError);

impl From<ScooterError> for ApiError {
    fn from(error: ScooterError) -> Self {
        Self(error)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.0.is_client_error() {
            self.0.to_string()
        } else {
            tracing::error!(error = %self.0, "request failed");
            "Internal error".to_string()
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

/// Handler result.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_core_taxonomy() {
        let cases = [
            (ScooterError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ScooterError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (ScooterError::Conflict("x".into()), StatusCode::CONFLICT),
            (ScooterError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ScooterError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ScooterError::Unavailable("Comments"), StatusCode::NOT_IMPLEMENTED),
            (ScooterError::StorageError("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError(error).status(), status);
        }
    }
}
