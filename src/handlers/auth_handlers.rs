//! Account handlers: register, login, logout and "who am I".

use crate::{
    auth::{cleared_cookie, session_cookie},
    errors::{AppError, INVALID_CREDENTIALS_MESSAGE},
    models::user::{Credentials, Identity, IdentityView},
    state::AppState,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use serde_json::json;
use tracing::info;

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// `POST /api/register`
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(credentials) = payload?;
    let username = credentials.username.trim();

    if username.is_empty() || credentials.password.is_empty() {
        return Err(AppError::bad_request("Username and password are required"));
    }
    if credentials.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::bad_request(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    state.users.register(username, &credentials.password).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Registration successful" })),
    ))
}

/// `POST /api/login`
///
/// Unknown usernames and wrong passwords produce the same 401.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(credentials) = payload?;
    let username = credentials.username.trim();

    if username.is_empty() || credentials.password.is_empty() {
        return Err(AppError::bad_request("Username and password are required"));
    }

    let user = state
        .users
        .authenticate(username, &credentials.password)
        .await?
        .ok_or_else(|| AppError::new(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS_MESSAGE))?;

    let (token, identity) = state
        .tokens
        .issue(user.id, &user.username)
        .map_err(|_| AppError::internal("Login failed"))?;

    info!("user {} logged in", user.username);
    Ok((
        jar.add(session_cookie(token, identity.expires_at)),
        Json(json!({ "message": "Login successful", "username": user.username })),
    ))
}

/// `POST /api/logout`
pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.add(cleared_cookie()),
        Json(json!({ "message": "Logout successful" })),
    )
}

/// `GET /api/me`
pub async fn me(identity: Identity) -> Json<IdentityView> {
    Json(IdentityView::from(&identity))
}
