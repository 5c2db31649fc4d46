pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod migrations;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::{
    config::AppConfig,
    models::song::builtin_samples,
    services::{
        jamendo_client::JamendoClient, library_service::LibraryService, token_codec::TokenCodec,
        user_service::UserService,
    },
    state::AppState,
};

/// Wire the services around an already migrated pool.
pub fn build_state(config: AppConfig, db: SqlitePool) -> Result<AppState> {
    let db = Arc::new(db);
    let search = JamendoClient::new(
        config.jamendo_api_url.clone(),
        config.jamendo_client_id.clone(),
        config.search_timeout,
    )
    .context("failed to build search HTTP client")?;

    Ok(AppState {
        library: LibraryService::new(db.clone(), config.upload_dir.clone(), builtin_samples()),
        users: UserService::new(db),
        tokens: Arc::new(TokenCodec::new(config.jwt_secret.as_bytes())),
        search,
        config: Arc::new(config),
    })
}

/// Build the HTTP application for `config` on top of `db`.
pub fn build_app(config: AppConfig, db: SqlitePool) -> Result<axum::Router> {
    Ok(routes::routes::routes(build_state(config, db)?))
}
