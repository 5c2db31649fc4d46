//! Defines routes for the music player API.
//!
//! ## Structure
//! - **Account endpoints**
//!   - `POST   /api/register`: create an account
//!   - `POST   /api/login`: issue the session cookie
//!   - `POST   /api/logout`: clear the session cookie
//!   - `GET    /api/me`: current identity (auth required)
//!
//! - **Catalog endpoints**
//!   - `GET    /api/songs`: per-viewer song list (auth optional)
//!   - `GET    /api/jamendo/search`: search the Jamendo catalog
//!   - `POST   /api/songs/upload`: multipart audio upload (auth required)
//!   - `POST   /api/songs/like`: like, materializing if needed (auth required)
//!   - `POST   /api/songs/unlike`: remove a like (auth required)
//!   - `DELETE /api/songs/{id}`: delete an owned upload (auth required)
//!
//! - **Static**
//!   - `GET    /uploads/*`: uploaded audio files

use crate::{
    auth::{optional_auth, require_auth},
    handlers::{
        auth_handlers::{login, logout, me, register},
        health_handlers::{healthz, readyz},
        search_handlers::search_tracks,
        song_handlers::{delete_song, like_song, list_songs, unlike_song, upload_song},
    },
    services::library_service::UPLOADS_ROUTE,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
};
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

/// Build the complete application router.
///
/// Each group carries its own auth middleware; tracing and the request
/// timeout wrap everything.
pub fn routes(state: AppState) -> Router {
    let config = state.config.clone();

    let protected = Router::new()
        .route("/api/me", get(me))
        .route(
            "/api/songs/upload",
            post(upload_song).layer(DefaultBodyLimit::max(config.max_upload_bytes)),
        )
        .route("/api/songs/like", post(like_song))
        .route("/api/songs/unlike", post(unlike_song))
        .route("/api/songs/{id}", delete(delete_song))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let browsing = Router::new()
        .route("/api/songs", get(list_songs))
        .route_layer(middleware::from_fn_with_state(state.clone(), optional_auth));

    let public = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/jamendo/search", get(search_tracks));

    Router::new()
        .merge(protected)
        .merge(browsing)
        .merge(public)
        .nest_service(UPLOADS_ROUTE, ServeDir::new(&config.upload_dir))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
