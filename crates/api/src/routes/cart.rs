//! Cart handlers. All require an authenticated session.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use mercantile_core::ProductId;

use crate::db::CartRepository;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpsertPayload {
    product_id: ProductId,
    quantity: i32,
}

/// Own cart, joined with product details.
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn index(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>> {
    let items = CartRepository::new(state.pool()).list(current.id()).await?;
    Ok(Json(json!({
        "status": "success",
        "results": items.len(),
        "data": { "items": items }
    })))
}

/// Put a product in the cart. Re-adding replaces the quantity.
///
/// # Errors
///
/// Returns 400 for a non-positive quantity, 404 for an unknown product.
pub async fn upsert(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<UpsertPayload>,
) -> Result<Json<serde_json::Value>> {
    let item = CartRepository::new(state.pool())
        .upsert(current.id(), payload.product_id, payload.quantity)
        .await?;
    Ok(Json(json!({ "status": "success", "data": { "item": item } })))
}

/// Remove one product from the cart.
///
/// # Errors
///
/// Returns 404 when the product isn't in the cart.
pub async fn remove(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(product_id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    CartRepository::new(state.pool())
        .remove(current.id(), product_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Empty the cart.
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn clear(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    CartRepository::new(state.pool()).clear(current.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
