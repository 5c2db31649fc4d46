//! HTTP handlers for the song catalog: listing, uploads, likes and deletion.
//! Upload bodies are streamed straight to disk; catalog rules live in
//! `LibraryService`.

use crate::{
    auth::CurrentIdentity,
    errors::AppError,
    models::{
        song::{DEFAULT_COVER_PATH, Song, SongCandidate, UploadMetadata},
        user::Identity,
    },
    services::library_service::{LibraryError, LibraryService, StoredUpload},
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Path, State,
        multipart::{Multipart, MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use std::{io, path::Path as FsPath};
use tracing::error;

/// Multipart field carrying the audio bytes.
pub const AUDIO_FIELD: &str = "audioFile";

/// Body of `POST /api/songs/unlike`.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UnlikeRequest {
    pub song_id: String,
}

/// `GET /api/songs`
///
/// Samples for everyone; uploads and likes only for an authenticated viewer.
pub async fn list_songs(
    State(state): State<AppState>,
    CurrentIdentity(identity): CurrentIdentity,
) -> Result<Json<Vec<Song>>, AppError> {
    let viewer = identity.map(|identity| identity.user_id);
    let songs = state.library.songs_for_viewer(viewer).await?;
    Ok(Json(songs))
}

/// `POST /api/songs/upload`
///
/// Multipart form: `audioFile` plus optional `title`, `artist`, `album` and
/// `duration` (seconds). The title defaults to the file name without its
/// extension.
pub async fn upload_song(
    State(state): State<AppState>,
    identity: Identity,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<impl IntoResponse, AppError> {
    let mut multipart = multipart?;
    let mut form = UploadForm::default();

    let read = read_upload_form(&state.library, identity.user_id, &mut multipart, &mut form).await;
    if let Err(err) = read {
        form.discard(&state.library).await;
        return Err(err);
    }

    let Some(stored) = form.file.take() else {
        return Err(AppError::bad_request(format!(
            "missing audio file field `{}`",
            AUDIO_FIELD
        )));
    };

    let metadata = match form.metadata() {
        Ok(metadata) => metadata,
        Err(err) => {
            state.library.discard_upload(&stored).await;
            return Err(err);
        }
    };

    let song = state
        .library
        .record_upload(identity.user_id, stored, metadata, DEFAULT_COVER_PATH)
        .await?;

    Ok((StatusCode::CREATED, Json(song)))
}

/// `POST /api/songs/like`
///
/// Accepts the full song description so tracks that were never stored
/// (search results) can be materialized on first like.
pub async fn like_song(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<SongCandidate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(candidate) = payload?;
    if candidate.song_id.trim().is_empty() && candidate.external_id().is_none() {
        return Err(AppError::bad_request("Song ID is required to like a song"));
    }

    let song_id = state.library.like_song(identity.user_id, &candidate).await?;

    Ok(Json(json!({
        "message": "Song liked successfully",
        "songId": song_id,
    })))
}

/// `POST /api/songs/unlike`
pub async fn unlike_song(
    State(state): State<AppState>,
    identity: Identity,
    payload: Result<Json<UnlikeRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let song_id = request.song_id.trim();
    if song_id.is_empty() {
        return Err(AppError::bad_request("Song ID is required to unlike a song"));
    }

    state.library.unlike_song(identity.user_id, song_id).await?;

    Ok(Json(json!({
        "message": "Song unliked successfully",
        "songId": song_id,
    })))
}

/// `DELETE /api/songs/{id}`
pub async fn delete_song(
    State(state): State<AppState>,
    identity: Identity,
    Path(song_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let song = state
        .library
        .delete_uploaded_song(identity.user_id, &song_id)
        .await?;

    Ok(Json(json!({
        "message": "Song deleted successfully",
        "songId": song.id,
    })))
}

#[derive(Default)]
struct UploadForm {
    file: Option<StoredUpload>,
    file_name: String,
    title: String,
    artist: String,
    album: String,
    duration: String,
}

impl UploadForm {
    async fn discard(&mut self, library: &LibraryService) {
        if let Some(stored) = self.file.take() {
            library.discard_upload(&stored).await;
        }
    }

    fn metadata(&self) -> Result<UploadMetadata, AppError> {
        let title = match self.title.trim() {
            "" => file_stem(&self.file_name),
            title => title.to_string(),
        };
        Ok(UploadMetadata {
            title,
            artist: self.artist.trim().to_string(),
            album: self.album.trim().to_string(),
            duration: parse_duration(&self.duration)?,
        })
    }
}

/// Drain the multipart stream into `form`, storing the audio field on disk
/// as soon as it is reached. On error `form.file` may hold a stored file
/// that the caller must discard.
async fn read_upload_form(
    library: &LibraryService,
    user_id: i64,
    multipart: &mut Multipart,
    form: &mut UploadForm,
) -> Result<(), AppError> {
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            AUDIO_FIELD => {
                if form.file.is_some() {
                    return Err(AppError::bad_request("only one audio file may be uploaded"));
                }
                let file_name = field.file_name().unwrap_or_default().to_string();
                let stream = field.map_err(io::Error::other);
                let stored = library
                    .store_upload_stream(user_id, &file_name, stream)
                    .await
                    .map_err(upload_error)?;
                form.file_name = file_name;
                form.file = Some(stored);
            }
            "title" => form.title = field.text().await?,
            "artist" => form.artist = field.text().await?,
            "album" => form.album = field.text().await?,
            "duration" => form.duration = field.text().await?,
            _ => {}
        }
    }
    Ok(())
}

/// Surface multipart read failures (notably an exceeded body limit) with
/// their own status instead of a generic storage error.
fn upload_error(err: LibraryError) -> AppError {
    match err {
        LibraryError::Io(io_err) if io_err.get_ref().is_some_and(|e| e.is::<MultipartError>()) => {
            match io_err.into_inner().map(|inner| inner.downcast::<MultipartError>()) {
                Some(Ok(multipart_err)) => AppError::from(*multipart_err),
                _ => {
                    error!("multipart error lost while unwrapping upload failure");
                    AppError::internal("internal server error")
                }
            }
        }
        other => other.into(),
    }
}

fn file_stem(file_name: &str) -> String {
    FsPath::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or_default()
        .to_string()
}

/// Parse the `duration` form value. Blank means unknown (0); fractional
/// seconds are rounded.
fn parse_duration(raw: &str) -> Result<i64, AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    match raw.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs.round() as i64),
        _ => Err(AppError::bad_request(
            "duration must be a non-negative number of seconds",
        )),
    }
}
