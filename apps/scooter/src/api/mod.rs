//! # Scooter HTTP API Module
//!
//! JSON over HTTP in front of the social core.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (never authenticated)
//! - `GET|PATCH /me`, `POST /username` - Own profile and handle claim
//! - `GET /feed`, `GET|POST /posts`, `GET|PATCH|DELETE /posts/{id}` - Posts
//! - `GET|POST /posts/{id}/comments`, `PATCH|DELETE /posts/{id}/comments/{cid}`
//! - `GET|POST /posts/{id}/reactions` - Reaction summary and toggle
//! - `POST /follow-request|/follow-accept|/follow-decline|/follow-cancel|/unfollow`
//! - `GET /notifications`, `GET /notifications/unread` - Inbox
//! - `GET /search`, `GET /u/{handle}[/followers|/following]` - People
//! - `POST /invites`, `POST /invites/redeem` - Invite codes
//!
//! Core calls are synchronous and may touch the disk, so handlers run them
//! on the blocking pool through [`blocking`].

pub mod auth;
pub mod error;
pub mod extract;
mod handlers;
pub mod middleware;
pub mod types;

pub use auth::CurrentUser;
pub use error::{ApiError, ApiResult, ErrorResponse};
pub use extract::{ApiJson, ApiQuery};
pub use middleware::create_rate_limiter;

use crate::config::AppConfig;
use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, patch, post},
};
use scooter_core::{ScooterError, Social};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub social: Arc<Social>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(social: Social, config: AppConfig) -> Self {
        Self {
            social: Arc::new(social),
            config: Arc::new(config),
        }
    }
}

/// Run a core call on the blocking pool.
pub(crate) async fn blocking<T, F>(state: &AppState, call: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce(&Social) -> Result<T, ScooterError> + Send + 'static,
{
    let social = Arc::clone(&state.social);
    tokio::task::spawn_blocking(move || call(&social))
        .await
        .map_err(|e| ApiError(ScooterError::StorageError(format!("worker failed: {e}"))))?
        .map_err(ApiError)
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

fn allowed_headers() -> [HeaderName; 4] {
    [
        header::CONTENT_TYPE,
        header::AUTHORIZATION,
        HeaderName::from_static(auth::USER_ID_HEADER),
        HeaderName::from_static(auth::USER_EMAIL_HEADER),
    ]
}

/// Build the CORS layer from the configured origins.
///
/// - `["*"]`: any origin (development only)
/// - empty: localhost only
/// - otherwise: exactly the listed origins
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => {
                tracing::info!("CORS: Allowing origin: {}", origin);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("CORS: Invalid origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    let allowed = if allowed.is_empty() {
        tracing::info!("CORS: No origins configured, defaulting to localhost only");
        [
            "http://localhost:3000",
            "http://localhost:5173",
            "http://127.0.0.1:3000",
            "http://127.0.0.1:5173",
        ]
        .into_iter()
        .map(HeaderValue::from_static)
        .collect()
    } else {
        allowed
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(allowed_headers())
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate limiting (if enabled)
/// 5. Gateway key check (if configured)
pub fn create_router(state: AppState) -> Router {
    let config = Arc::clone(&state.config);

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        // Identity
        .route("/me", get(handlers::users::me).patch(handlers::users::update_me))
        .route("/username", post(handlers::users::claim_username))
        .route("/search", get(handlers::users::search))
        .route("/u/{handle}", get(handlers::users::profile))
        .route("/u/{handle}/followers", get(handlers::users::followers))
        .route("/u/{handle}/following", get(handlers::users::following))
        // Content
        .route("/feed", get(handlers::posts::feed))
        .route(
            "/posts",
            get(handlers::posts::global).post(handlers::posts::create),
        )
        .route(
            "/posts/{id}",
            get(handlers::posts::get_one)
                .patch(handlers::posts::edit)
                .delete(handlers::posts::delete),
        )
        // Interactions
        .route(
            "/posts/{id}/comments",
            get(handlers::interactions::list_comments).post(handlers::interactions::add_comment),
        )
        .route(
            "/posts/{id}/comments/{cid}",
            patch(handlers::interactions::edit_comment)
                .delete(handlers::interactions::delete_comment),
        )
        .route(
            "/posts/{id}/reactions",
            get(handlers::interactions::reactions).post(handlers::interactions::toggle_reaction),
        )
        // Relationships
        .route("/follow-request", post(handlers::relationships::request))
        .route("/follow-accept", post(handlers::relationships::accept))
        .route("/follow-decline", post(handlers::relationships::decline))
        .route("/follow-cancel", post(handlers::relationships::cancel))
        .route("/unfollow", post(handlers::relationships::unfollow))
        // Inbox
        .route("/notifications", get(handlers::inbox::list))
        .route("/notifications/unread", get(handlers::inbox::unread))
        // Invites
        .route("/invites", post(handlers::inbox::issue_invite))
        .route("/invites/redeem", post(handlers::inbox::redeem_invite));

    if config.gateway_key.is_some() {
        tracing::info!("Gateway key authentication enabled");
        router = router.layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::gateway_auth_middleware,
        ));
    } else {
        tracing::warn!(
            "Gateway key authentication DISABLED - identity headers are trusted from any client. \
             Set SCOOTER_GATEWAY_KEY to enable it."
        );
    }

    if config.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", config.rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(config.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(&config.cors_origins))
                .layer(axum::extract::DefaultBodyLimit::max(config.body_limit)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve `state` on `addr` until Ctrl+C.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), ScooterError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ScooterError::StorageError(format!("Bind failed: {e}")))?;

    tracing::info!("Scooter HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Cannot listen for shutdown signal: {}", e);
            }
            tracing::info!("Shutting down");
        })
        .await
        .map_err(|e| ScooterError::StorageError(format!("Server error: {e}")))
}
