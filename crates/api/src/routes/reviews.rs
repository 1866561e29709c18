//! Review handlers.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use mercantile_core::{ProductId, ReviewId};

use crate::db::ReviewRepository;
use crate::error::Result;
use crate::middleware::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateReviewPayload {
    rate: i16,
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateReviewPayload {
    rate: Option<i16>,
    comment: Option<String>,
}

/// Reviews for a product, with author names.
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn list_for_product(
    State(state): State<AppState>,
    Path(product_id): Path<ProductId>,
) -> Result<Json<serde_json::Value>> {
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(product_id)
        .await?;
    Ok(Json(json!({
        "status": "success",
        "results": reviews.len(),
        "data": { "reviews": reviews }
    })))
}

/// Review a product. One review per user per product.
///
/// # Errors
///
/// Returns 400 for a rate outside 0..=10, 409 for a second review of the
/// same product, 404 for an unknown product.
pub async fn create(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(product_id): Path<ProductId>,
    Json(payload): Json<CreateReviewPayload>,
) -> Result<impl IntoResponse> {
    let review = ReviewRepository::new(state.pool())
        .create(
            current.id(),
            product_id,
            payload.rate,
            payload.comment.as_deref(),
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "status": "success", "data": { "review": review } })),
    ))
}

/// Edit a review. Users edit their own; admins edit any.
///
/// # Errors
///
/// Returns 404 when no matching review exists.
pub async fn update(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<ReviewId>,
    Json(payload): Json<UpdateReviewPayload>,
) -> Result<Json<serde_json::Value>> {
    let owner = if current.is_admin() {
        None
    } else {
        Some(current.id())
    };
    let review = ReviewRepository::new(state.pool())
        .update(id, owner, payload.rate, payload.comment.as_deref())
        .await?;
    Ok(Json(
        json!({ "status": "success", "data": { "review": review } }),
    ))
}

/// Delete a review. Users delete their own; admins delete any.
///
/// # Errors
///
/// Returns 404 when no matching review exists.
pub async fn remove(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<ReviewId>,
) -> Result<impl IntoResponse> {
    let owner = if current.is_admin() {
        None
    } else {
        Some(current.id())
    };
    ReviewRepository::new(state.pool()).delete(id, owner).await?;
    Ok(StatusCode::NO_CONTENT)
}
