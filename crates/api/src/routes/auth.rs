//! Session handlers: signup, login, logout, and the password flows.

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use serde_json::json;

use mercantile_core::Email;

use crate::db::UserRepository;
use crate::error::{AppError, Result, clear_sentry_user};
use crate::middleware::CurrentUser;
use crate::models::user::User;
use crate::services::auth::{
    clear_session_cookies, generate_reset_token, hash_password, hash_reset_token,
    reset_token_expiry, session_cookies, verify_password,
};
use crate::state::AppState;

const MIN_PASSWORD_LENGTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct SignupPayload {
    name: String,
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordPayload {
    email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordPayload {
    password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePasswordPayload {
    current_password: String,
    new_password: String,
}

/// Create an account and start a session.
///
/// # Errors
///
/// Fails on invalid email, short password, or a taken name/email.
pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<SignupPayload>,
) -> Result<impl IntoResponse> {
    let email = parse_email(&payload.email)?;
    validate_password(&payload.password)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name must not be empty".to_owned()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user = UserRepository::new(state.pool())
        .create(payload.name.trim(), &email, &password_hash)
        .await?;

    let jar = start_session(&state, jar, &user)?;
    Ok((
        StatusCode::CREATED,
        jar,
        Json(json!({ "status": "success", "data": { "user": user } })),
    ))
}

/// Verify credentials and start a session.
///
/// # Errors
///
/// Returns 401 for a wrong email or password, without saying which.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse> {
    let wrong_credentials =
        || AppError::Unauthorized("Incorrect email or password".to_owned());

    let email = Email::parse(&payload.email).map_err(|_| wrong_credentials())?;
    let account = UserRepository::new(state.pool())
        .get_with_password_by_email(&email)
        .await?
        .ok_or_else(wrong_credentials)?;

    if !verify_password(&payload.password, &account.password_hash) {
        return Err(wrong_credentials());
    }

    let jar = start_session(&state, jar, &account.user)?;
    Ok((
        jar,
        Json(json!({ "status": "success", "data": { "user": account.user } })),
    ))
}

/// Clear the session cookie pair.
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    clear_sentry_user();
    let (access, refresh) = clear_session_cookies(state.config().cookie_secure);
    (
        jar.add(access).add(refresh),
        Json(json!({ "status": "success" })),
    )
}

/// Store a reset token for the account and email the reset link.
///
/// When SMTP isn't configured the link lands in the logs instead, which
/// keeps local development working without a relay.
///
/// # Errors
///
/// Returns 404 for an unknown email, 500 when the email cannot be sent
/// (the stored token is discarded so a later attempt starts clean).
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordPayload>,
) -> Result<Json<serde_json::Value>> {
    let email = parse_email(&payload.email)?;
    let users = UserRepository::new(state.pool());
    let user = users
        .get_by_email(&email)
        .await?
        .ok_or_else(|| AppError::NotFound("There is no user with that email address".to_owned()))?;

    let (plain, hashed) = generate_reset_token();
    users
        .set_reset_token(user.id, &hashed, reset_token_expiry())
        .await?;

    let reset_url = reset_link(&state.config().frontend_url, &plain);

    if let Some(mailer) = state.email() {
        if let Err(err) = mailer.send_password_reset(email.as_str(), &reset_url).await {
            users.clear_reset_token(user.id).await?;
            return Err(err.into());
        }
    } else {
        tracing::info!(user_id = %user.id, %reset_url, "SMTP not configured; reset link logged");
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Token sent to email"
    })))
}

/// Set a new password using an emailed reset token, then start a session.
///
/// # Errors
///
/// Returns 400 for an expired or unknown token.
pub async fn reset_password(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(token): Path<String>,
    Json(payload): Json<ResetPasswordPayload>,
) -> Result<impl IntoResponse> {
    validate_password(&payload.password)?;

    let users = UserRepository::new(state.pool());
    let user = users
        .find_by_reset_token(&hash_reset_token(&token))
        .await?
        .ok_or_else(|| AppError::BadRequest("Token is invalid or has expired".to_owned()))?;

    let password_hash = hash_password(&payload.password)?;
    users.update_password(user.id, &password_hash).await?;

    let jar = start_session(&state, jar, &user)?;
    Ok((
        jar,
        Json(json!({ "status": "success", "data": { "user": user } })),
    ))
}

/// Change the password of the logged-in user, reissuing the session.
///
/// # Errors
///
/// Returns 401 when the current password doesn't match.
pub async fn update_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
    Json(payload): Json<UpdatePasswordPayload>,
) -> Result<impl IntoResponse> {
    validate_password(&payload.new_password)?;

    let users = UserRepository::new(state.pool());
    let account = users
        .get_with_password_by_id(current.id())
        .await?
        .ok_or_else(|| AppError::Unauthorized("You are not logged in".to_owned()))?;

    if !verify_password(&payload.current_password, &account.password_hash) {
        return Err(AppError::Unauthorized(
            "Your current password is wrong".to_owned(),
        ));
    }

    let password_hash = hash_password(&payload.new_password)?;
    users.update_password(current.id(), &password_hash).await?;

    let jar = start_session(&state, jar, &account.user)?;
    Ok((jar, Json(json!({ "status": "success" }))))
}

/// Issue a fresh token pair for `user` and put it on the jar.
fn start_session(state: &AppState, jar: CookieJar, user: &User) -> Result<CookieJar> {
    let tokens = state.tokens();
    let access = tokens.issue_access(user.id)?;
    let refresh = tokens.issue_refresh(user.id)?;
    let (access_cookie, refresh_cookie) = session_cookies(
        access,
        refresh,
        tokens.access_ttl(),
        tokens.refresh_ttl(),
        state.config().cookie_secure,
    );
    Ok(jar.add(access_cookie).add(refresh_cookie))
}

/// Build the emailed reset link. It points at the storefront's reset
/// page, which collects the new password and calls the API with the
/// token.
fn reset_link(frontend_url: &str, token: &str) -> String {
    format!("{}/reset-password/{token}", frontend_url.trim_end_matches('/'))
}

fn parse_email(raw: &str) -> Result<Email> {
    Email::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::BadRequest(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_points_at_storefront_page() {
        let link = reset_link("https://shop.example.com", "abc123");
        assert_eq!(link, "https://shop.example.com/reset-password/abc123");
        assert!(!link.contains("/api/"));
    }

    #[test]
    fn reset_link_drops_trailing_slash() {
        let link = reset_link("https://shop.example.com/", "abc123");
        assert_eq!(link, "https://shop.example.com/reset-password/abc123");
    }

    #[test]
    fn short_password_is_rejected() {
        assert!(validate_password("seven77").is_err());
        assert!(validate_password("eight888").is_ok());
    }
}
