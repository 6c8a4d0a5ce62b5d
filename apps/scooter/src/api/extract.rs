//! # Body and Query Extractors
//!
//! Wrappers over axum's `Json` and `Query` whose rejections are answered like
//! every other failure: `400` with a `{"message"}` body.

use super::error::ApiError;
use axum::{
    Json,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
};
use scooter_core::ScooterError;
use serde::de::DeserializeOwned;

/// JSON request body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<T, S> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(request, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(ScooterError::Validation(rejection.body_text()))),
        }
    }
}

/// Query string parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<T, S> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(Self(value)),
            Err(rejection) => Err(ApiError(ScooterError::Validation(rejection.body_text()))),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct CommentBody {
        text: String,
    }

    #[derive(Debug, Deserialize)]
    struct Params {
        limit: Option<usize>,
    }

    fn json_request(body: &'static str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn missing_field_is_a_validation_error() {
        let err = ApiJson::<CommentBody>::from_request(json_request("{}"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
        assert!(matches!(err.0, ScooterError::Validation(ref m) if m.contains("text")));
    }

    #[tokio::test]
    async fn well_formed_body_is_extracted() {
        let ApiJson(body) = ApiJson::<CommentBody>::from_request(json_request(r#"{"text":"hi"}"#), &())
            .await
            .unwrap();
        assert_eq!(body.text, "hi");
    }

    #[tokio::test]
    async fn malformed_query_is_a_validation_error() {
        let (mut parts, ()) = axum::http::Request::builder()
            .uri("/?limit=many")
            .body(())
            .unwrap()
            .into_parts();
        let err = ApiQuery::<Params>::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert!(matches!(err.0, ScooterError::Validation(_)));

        let (mut parts, ()) = axum::http::Request::builder()
            .uri("/?limit=5")
            .body(())
            .unwrap()
            .into_parts();
        let ApiQuery(params) = ApiQuery::<Params>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(params.limit, Some(5));
    }
}
