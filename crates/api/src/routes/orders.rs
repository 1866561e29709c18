//! Order and checkout handlers.
//!
//! Checkout is two-legged: `checkout_session` sends the browser to the
//! gateway's payment page, and the order itself is created later by the
//! webhook handler once payment completes. Admins can also create a
//! pending order directly from a user's cart for phone/mail orders.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use mercantile_core::{OrderId, OrderStatus, UserId};

use crate::db::{CartRepository, OrderError, OrderRepository};
use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::routes::Pagination;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
    status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct AllOrdersQuery {
    status: Option<OrderStatus>,
    page: Option<i64>,
    limit: Option<i64>,
}

/// Create a gateway checkout session for the current cart.
///
/// # Errors
///
/// Returns 400 for an empty cart, 502 when the gateway call fails.
pub async fn checkout_session(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>> {
    let items = CartRepository::new(state.pool()).list(current.id()).await?;
    if items.is_empty() {
        return Err(OrderError::EmptyCart.into());
    }

    let session = state
        .checkout()
        .create_session(current.id(), &items, &state.config().base_url)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "data": { "session": { "id": session.id, "url": session.url } }
    })))
}

/// Own orders, newest first.
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn index(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<serde_json::Value>> {
    let (page, limit) = pagination.clamp();
    let (orders, total) = OrderRepository::new(state.pool())
        .list_for_user(current.id(), page, limit)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "results": orders.len(),
        "total": total,
        "data": { "orders": orders }
    })))
}

/// One of the caller's orders; admins can fetch anyone's.
///
/// # Errors
///
/// Returns 404 for an unknown order or someone else's order.
pub async fn show(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<OrderId>,
) -> Result<Json<serde_json::Value>> {
    let repo = OrderRepository::new(state.pool());
    let order = if current.is_admin() {
        repo.get(id).await?
    } else {
        repo.get_for_user(id, current.id()).await?
    }
    .ok_or_else(|| AppError::NotFound("No order found with that ID".to_owned()))?;
    Ok(Json(json!({ "status": "success", "data": { "order": order } })))
}

/// Cancel an order, restoring stock. Users cancel their own; admins any.
///
/// # Errors
///
/// Returns 400 for orders past the cancellable stages.
pub async fn cancel(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<OrderId>,
) -> Result<Json<serde_json::Value>> {
    let owner = if current.is_admin() {
        None
    } else {
        Some(current.id())
    };
    let order = OrderRepository::new(state.pool()).cancel(id, owner).await?;
    Ok(Json(json!({ "status": "success", "data": { "order": order } })))
}

/// Every order (admin), optionally filtered by status.
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn list_all(
    State(state): State<AppState>,
    Query(query): Query<AllOrdersQuery>,
) -> Result<Json<serde_json::Value>> {
    let (page, limit) = Pagination {
        page: query.page,
        limit: query.limit,
    }
    .clamp();
    let (orders, total) = OrderRepository::new(state.pool())
        .list_all(query.status, page, limit)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "results": orders.len(),
        "total": total,
        "data": { "orders": orders }
    })))
}

/// Create a pending order from a user's cart (admin).
///
/// # Errors
///
/// Returns 400 for an empty cart or insufficient stock.
pub async fn create_for_user(
    State(state): State<AppState>,
    Path(user_id): Path<UserId>,
) -> Result<impl IntoResponse> {
    let order = OrderRepository::new(state.pool())
        .create_from_cart(user_id, None)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": { "order": order } })),
    ))
}

/// Move an order's lifecycle status (admin).
///
/// # Errors
///
/// Returns 400 for an illegal transition, 404 for an unknown order.
pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Json(payload): Json<UpdateStatusPayload>,
) -> Result<Json<serde_json::Value>> {
    let order = OrderRepository::new(state.pool())
        .update_status(id, payload.status)
        .await?;
    Ok(Json(json!({ "status": "success", "data": { "order": order } })))
}

/// Delete an order (admin), restoring stock unless it was cancelled.
///
/// # Errors
///
/// Returns 404 for an unknown order.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
) -> Result<impl IntoResponse> {
    OrderRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
