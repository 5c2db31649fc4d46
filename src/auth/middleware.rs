use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use tracing::debug;

use super::cookie::{SESSION_COOKIE, cleared_cookie};
use crate::{errors::AppError, state::AppState};

/// Reject the request with 401 unless it carries a valid session cookie.
///
/// A cookie that fails validation is cleared in the same response.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = jar.get(SESSION_COOKIE).map(|c| c.value().to_owned()) else {
        debug!("no session cookie on {}", request.uri().path());
        return AppError::unauthorized().into_response();
    };

    match state.tokens.validate(&token) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => (jar.add(cleared_cookie()), AppError::from(err)).into_response(),
    }
}

/// Attach the identity when the session cookie is valid; otherwise carry
/// on anonymously without touching the cookie.
pub async fn optional_auth(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        if let Ok(identity) = state.tokens.validate(cookie.value()) {
            request.extensions_mut().insert(identity);
        }
    }
    next.run(request).await
}
