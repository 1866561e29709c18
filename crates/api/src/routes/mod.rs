//! HTTP route handlers for the API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                        - Liveness check
//! GET    /health/ready                  - Readiness check (pings the database)
//! POST   /webhook-checkout              - Payment gateway webhook (signed, raw body)
//!
//! # Auth (rate limited harder than the rest)
//! POST   /api/users/signup              - Create account, start session
//! POST   /api/users/login               - Start session
//! POST   /api/users/logout              - Clear session cookies
//! POST   /api/users/forgot-password     - Email a reset link
//! PATCH  /api/users/reset-password/{token} - Reset password with emailed token
//!
//! # Profile (requires auth)
//! GET    /api/users/me                  - Own profile
//! PATCH  /api/users/me                  - Update name/email
//! PATCH  /api/users/me/password         - Change password
//! POST   /api/users/me/photo            - Upload avatar
//! DELETE /api/users/me                  - Deactivate account
//!
//! # Users (admin)
//! GET    /api/users                     - List users
//! GET    /api/users/{id}                - One user
//! PATCH  /api/users/{id}                - Update user (incl. role)
//! DELETE /api/users/{id}                - Delete user
//!
//! # Products (reads public, writes admin)
//! GET    /api/products                  - Listing with filters and sort
//! GET    /api/products/{id}             - One product, by id or slug
//! POST   /api/products                  - Create product
//! PATCH  /api/products/{id}             - Update product
//! DELETE /api/products/{id}             - Delete product (refused while stocked)
//! POST   /api/products/{id}/images      - Upload product images
//! GET    /api/products/{id}/reviews     - Reviews for a product
//! POST   /api/products/{id}/reviews     - Review a product (requires auth)
//!
//! # Cart (requires auth)
//! GET    /api/cart                      - Own cart with product details
//! POST   /api/cart                      - Put a product in the cart
//! DELETE /api/cart/{product_id}         - Remove one product
//! DELETE /api/cart                      - Empty the cart
//!
//! # Orders (requires auth)
//! POST   /api/orders/checkout-session   - Create a gateway checkout session
//! GET    /api/orders                    - Own orders
//! GET    /api/orders/{id}               - One of own orders
//! PATCH  /api/orders/{id}/cancel        - Cancel own order
//! GET    /api/orders/all                - Every order (admin)
//! POST   /api/orders/users/{user_id}    - Order from a user's cart (admin)
//! PATCH  /api/orders/{id}/status        - Move order lifecycle (admin)
//! DELETE /api/orders/{id}               - Delete order (admin)
//!
//! # Reviews (requires auth)
//! PATCH  /api/reviews/{id}              - Edit own review
//! DELETE /api/reviews/{id}              - Delete own review (admin: any)
//! ```

pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod users;
pub mod webhook;

use axum::extract::State;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::middleware::{protect, require_admin};
use crate::state::AppState;

/// Query-string pagination, defaulting to the first page of 20.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Pagination {
    page: Option<i64>,
    limit: Option<i64>,
}

impl Pagination {
    const MAX_LIMIT: i64 = 100;

    /// Returns `(page, limit)` clamped to sane bounds.
    #[must_use]
    pub fn clamp(self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(20).clamp(1, Self::MAX_LIMIT);
        (page, limit)
    }
}

/// Session endpoints: mounted separately so the stricter auth limiter can
/// wrap them. None require an existing session.
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/{token}", patch(auth::reset_password))
}

fn user_routes(state: AppState) -> Router<AppState> {
    let admin = from_fn(require_admin);
    Router::new()
        .route(
            "/me",
            get(users::me)
                .patch(users::update_me)
                .delete(users::deactivate_me),
        )
        .route("/me/password", patch(auth::update_password))
        .route("/me/photo", post(users::upload_photo))
        .route("/", get(users::list).layer(admin.clone()))
        .route(
            "/{id}",
            get(users::show)
                .patch(users::update)
                .delete(users::remove)
                .layer(admin),
        )
        .layer(from_fn_with_state(state, protect))
}

fn product_routes(state: AppState) -> Router<AppState> {
    // Writes want protect + require_admin; reads stay public, so the auth
    // stack goes on individual method routers rather than the whole router.
    let admin_stack = |route: axum::routing::MethodRouter<AppState>| {
        route
            .layer(from_fn(require_admin))
            .layer(from_fn_with_state(state.clone(), protect))
    };

    Router::new()
        .route(
            "/",
            get(products::index).merge(admin_stack(post(products::create))),
        )
        .route(
            "/{id}",
            get(products::show).merge(admin_stack(
                patch(products::update).delete(products::remove),
            )),
        )
        .route("/{id}/images", admin_stack(post(products::upload_images)))
        .route(
            "/{id}/reviews",
            get(reviews::list_for_product).merge(
                post(reviews::create).layer(from_fn_with_state(state.clone(), protect)),
            ),
        )
}

fn cart_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(cart::index).post(cart::upsert).delete(cart::clear))
        .route("/{product_id}", delete(cart::remove))
        .layer(from_fn_with_state(state, protect))
}

fn order_routes(state: AppState) -> Router<AppState> {
    let admin = from_fn(require_admin);
    Router::new()
        .route("/checkout-session", post(orders::checkout_session))
        .route("/", get(orders::index))
        .route("/all", get(orders::list_all).layer(admin.clone()))
        .route(
            "/users/{user_id}",
            post(orders::create_for_user).layer(admin.clone()),
        )
        .route(
            "/{id}",
            get(orders::show).merge(delete(orders::remove).layer(admin.clone())),
        )
        .route("/{id}/cancel", patch(orders::cancel))
        .route("/{id}/status", patch(orders::update_status).layer(admin))
        .layer(from_fn_with_state(state, protect))
}

fn review_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/{id}", patch(reviews::update).delete(reviews::remove))
        .layer(from_fn_with_state(state, protect))
}

/// Assemble everything under `/api` except the session endpoints.
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes(state.clone()))
        .nest("/products", product_routes(state.clone()))
        .nest("/cart", cart_routes(state.clone()))
        .nest("/orders", order_routes(state.clone()))
        .nest("/reviews", review_routes(state))
}

/// Liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "success" }))
}

/// Readiness probe: confirms the database answers.
///
/// # Errors
///
/// Returns `AppError::Database` when the pool can't run a query.
pub async fn health_ready(State(state): State<AppState>) -> Result<Json<serde_json::Value>> {
    sqlx::query("SELECT 1")
        .execute(state.pool())
        .await
        .map_err(|e| AppError::Database(e.into()))?;
    Ok(Json(json!({ "status": "success" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults() {
        let p = Pagination {
            page: None,
            limit: None,
        };
        assert_eq!(p.clamp(), (1, 20));
    }

    #[test]
    fn test_pagination_clamps() {
        let p = Pagination {
            page: Some(0),
            limit: Some(10_000),
        };
        assert_eq!(p.clamp(), (1, Pagination::MAX_LIMIT));
    }
}
