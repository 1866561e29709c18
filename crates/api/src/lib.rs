//! Mercantile API library.
//!
//! The whole HTTP surface lives here as a library so integration tests can
//! build the router without spawning the binary.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Assemble the full application router.
///
/// The webhook sits outside `/api` and outside the rate limiters; the
/// session endpoints carry a stricter limiter than the rest of `/api`.
///
/// # Panics
///
/// Panics if the configured CORS origin is not a valid header value.
#[must_use]
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            state
                .config()
                .cors_origin
                .parse::<HeaderValue>()
                .expect("CORS origin must be a valid header value"),
        )
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    let api = Router::new()
        .nest("/users", routes::session_routes().layer(auth_rate_limiter()))
        .merge(routes::api_routes(state.clone()))
        .layer(api_rate_limiter());

    Router::new()
        .route("/health", get(routes::health))
        .route("/health/ready", get(routes::health_ready))
        .route("/webhook-checkout", post(routes::webhook::checkout))
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
