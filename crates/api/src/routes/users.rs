//! Profile and user-administration handlers.

use axum::extract::{Extension, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use mercantile_core::{Email, Role, UserId};

use crate::db::UserRepository;
use crate::error::{AppError, Result};
use crate::middleware::CurrentUser;
use crate::routes::Pagination;
use crate::services::media::USER_PHOTO_SIZE;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UpdateMePayload {
    name: Option<String>,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AdminUpdatePayload {
    name: Option<String>,
    email: Option<String>,
    role: Option<Role>,
}

/// Own profile.
pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<serde_json::Value> {
    Json(json!({ "status": "success", "data": { "user": current.user } }))
}

/// Update own name/email. Password changes go through their own endpoint.
///
/// # Errors
///
/// Fails on invalid email or a taken name/email.
pub async fn update_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(payload): Json<UpdateMePayload>,
) -> Result<Json<serde_json::Value>> {
    let email = parse_optional_email(payload.email.as_deref())?;
    let user = UserRepository::new(state.pool())
        .update_profile(current.id(), payload.name.as_deref(), email.as_ref(), None)
        .await?;
    Ok(Json(json!({ "status": "success", "data": { "user": user } })))
}

/// Upload a new avatar; resized to a square and stored at the image host.
///
/// # Errors
///
/// Fails when uploads aren't configured or the file isn't an image.
pub async fn upload_photo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>> {
    let media = state.media().ok_or_else(|| {
        AppError::BadRequest("image uploads are not configured on this server".to_owned())
    })?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
        .ok_or_else(|| AppError::BadRequest("no file in upload".to_owned()))?;
    let bytes = field
        .bytes()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let filename = format!("user-{}.jpg", current.id());
    let url = media.upload(&bytes, &filename, USER_PHOTO_SIZE).await?;

    let user = UserRepository::new(state.pool())
        .update_profile(current.id(), None, None, Some(&url))
        .await?;
    Ok(Json(json!({ "status": "success", "data": { "user": user } })))
}

/// Deactivate own account (soft delete).
///
/// # Errors
///
/// Returns `AppError::Database` if the update fails.
pub async fn deactivate_me(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    UserRepository::new(state.pool())
        .soft_delete(current.id())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// List users (admin).
///
/// # Errors
///
/// Returns `AppError::Database` if the query fails.
pub async fn list(
    State(state): State<AppState>,
    axum::extract::Query(pagination): axum::extract::Query<Pagination>,
) -> Result<Json<serde_json::Value>> {
    let (page, limit) = pagination.clamp();
    let (users, total) = UserRepository::new(state.pool()).list(page, limit).await?;
    Ok(Json(json!({
        "status": "success",
        "results": users.len(),
        "total": total,
        "data": { "users": users }
    })))
}

/// One user by id (admin).
///
/// # Errors
///
/// Returns 404 for an unknown or deactivated user.
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<Json<serde_json::Value>> {
    let user = UserRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("No user found with that ID".to_owned()))?;
    Ok(Json(json!({ "status": "success", "data": { "user": user } })))
}

/// Update any user, including their role (admin).
///
/// # Errors
///
/// Fails on invalid email, a taken name/email, or an unknown user.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(payload): Json<AdminUpdatePayload>,
) -> Result<Json<serde_json::Value>> {
    let email = parse_optional_email(payload.email.as_deref())?;
    let user = UserRepository::new(state.pool())
        .admin_update(id, payload.name.as_deref(), email.as_ref(), payload.role)
        .await?;
    Ok(Json(json!({ "status": "success", "data": { "user": user } })))
}

/// Physically delete a user (admin).
///
/// # Errors
///
/// Returns 404 for an unknown user.
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<UserId>,
) -> Result<impl IntoResponse> {
    UserRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_optional_email(raw: Option<&str>) -> Result<Option<Email>> {
    raw.map(|s| Email::parse(s).map_err(|e| AppError::BadRequest(e.to_string())))
        .transpose()
}
