//! Track search, proxied to the Jamendo API.

use crate::{errors::AppError, models::song::Song, state::AppState};
use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

/// `GET /api/jamendo/search?query=...`
pub async fn search_tracks(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<Song>>, AppError> {
    let query = params.query.as_deref().map(str::trim).unwrap_or_default();
    if query.is_empty() {
        return Err(AppError::bad_request("Missing search query"));
    }

    let songs = state.search.search_tracks(query).await?;
    Ok(Json(songs))
}
