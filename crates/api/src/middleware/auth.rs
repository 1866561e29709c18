//! Route protection with silent refresh.
//!
//! `protect` authenticates a request from a bearer header or the session
//! cookie pair. An
//! access token that is merely expired triggers a silent refresh: the
//! refresh token is verified, a fresh pair is issued (rotation), and the
//! new cookies ride back on the response. A token that fails for any other
//! reason gets a plain 401; tampering never earns a refresh.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::CookieJar;

use mercantile_core::{Role, UserId};

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::user::User;
use crate::services::auth::{
    ACCESS_COOKIE, AuthError, REFRESH_COOKIE, TokenType, session_cookies,
};
use crate::state::AppState;

/// The authenticated user, inserted into request extensions by [`protect`].
#[derive(Clone)]
pub struct CurrentUser {
    pub user: User,
}

impl CurrentUser {
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.user.id
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}

/// Authenticate the request, refreshing the session when the access token
/// has merely expired.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` when no usable session is present.
pub async fn protect(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let access = bearer_token(&request)
        .or_else(|| jar.get(ACCESS_COOKIE).map(|c| c.value().to_owned()))
        .ok_or_else(|| {
            AppError::Unauthorized("You are not logged in. Please log in to get access".to_owned())
        })?;

    let (user, refreshed) = match state.tokens().verify(&access, TokenType::Access) {
        Ok(claims) => (load_user(&state, claims.sub, claims.iat).await?, None),
        Err(AuthError::TokenExpired) => {
            let refresh = jar
                .get(REFRESH_COOKIE)
                .map(|c| c.value().to_owned())
                .ok_or_else(|| {
                    AppError::Unauthorized("Session expired, please log in again".to_owned())
                })?;
            let claims = state.tokens().verify(&refresh, TokenType::Refresh)?;
            let user = load_user(&state, claims.sub, claims.iat).await?;

            let access = state.tokens().issue_access(user.id)?;
            let refresh = state.tokens().issue_refresh(user.id)?;
            (user, Some((access, refresh)))
        }
        Err(err) => return Err(err.into()),
    };

    set_sentry_user(&user.id, Some(user.email.as_str()));
    request
        .extensions_mut()
        .insert(CurrentUser { user });

    let response = next.run(request).await;

    // Attach the rotated pair, if any, without clobbering cookies the
    // handler itself may have set.
    if let Some((access, refresh)) = refreshed {
        let tokens = state.tokens();
        let (access_cookie, refresh_cookie) = session_cookies(
            access,
            refresh,
            tokens.access_ttl(),
            tokens.refresh_ttl(),
            state.config().cookie_secure,
        );
        let jar = CookieJar::new().add(access_cookie).add(refresh_cookie);
        return Ok((jar, response).into_response());
    }
    Ok(response)
}

/// Access token from the `Authorization: Bearer` header, if present.
/// API clients use this; browsers use the cookie pair.
fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

/// Require the authenticated user to be an admin. Layered after [`protect`].
///
/// # Errors
///
/// Returns `AppError::Forbidden` for non-admin users, and
/// `AppError::Unauthorized` if [`protect`] did not run.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    let current = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| AppError::Unauthorized("You are not logged in".to_owned()))?;

    if !current.is_admin() {
        return Err(AppError::Forbidden(
            "You do not have permission to perform this action".to_owned(),
        ));
    }
    Ok(next.run(request).await)
}

/// Resolve claims to a live account, rejecting tokens issued before the
/// password last changed.
async fn load_user(state: &AppState, user_id: i32, issued_at: i64) -> Result<User, AppError> {
    let user = UserRepository::new(state.pool())
        .get_by_id(UserId::new(user_id))
        .await?
        .ok_or_else(|| {
            AppError::Unauthorized("The user belonging to this token no longer exists".to_owned())
        })?;

    if user.password_changed_after(issued_at) {
        return Err(AppError::Unauthorized(
            "Password was changed recently. Please log in again".to_owned(),
        ));
    }
    Ok(user)
}
