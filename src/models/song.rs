//! Represents a playable song, whatever its provenance.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cover shown for songs that do not carry their own artwork.
pub const DEFAULT_COVER_PATH: &str = "/static/images/default-cover.jpg";

/// Identifier prefix for songs materialized from the Jamendo catalog.
pub const JAMENDO_ID_PREFIX: &str = "jamendo";

/// Identifier prefix for user uploads.
pub const UPLOAD_ID_PREFIX: &str = "local";

/// Identifier prefix for external songs that arrive without a known source id.
pub const EXTERNAL_ID_PREFIX: &str = "external";

/// A song as stored in the `songs` table and returned to clients.
///
/// Three provenance classes share this shape:
/// - built-in samples (fixed identifiers, no owner, never uploaded)
/// - user uploads (`user_id` set, `is_uploaded = true`)
/// - external tracks (no owner, `jamendo_id` set)
///
/// `is_liked` and `can_delete` are not persisted; they are computed for the
/// viewer on every request.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    /// Globally unique identifier (`sample-1`, `local-<uuid>`, `jamendo-<id>`).
    pub id: String,

    /// Owning user, only for uploads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,

    pub title: String,
    pub artist: String,
    pub album: String,

    /// Playable URL or server-relative path.
    pub file_path: String,

    /// Artwork URL or server-relative path.
    pub cover_path: String,

    /// True for built-in samples and uploads served by this backend.
    pub is_local: bool,

    /// True only for user uploads.
    pub is_uploaded: bool,

    /// Track id in the Jamendo catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jamendo_id: Option<String>,

    /// Duration in whole seconds.
    pub duration: i64,

    #[sqlx(skip)]
    #[serde(default)]
    pub is_liked: bool,

    #[sqlx(skip)]
    #[serde(default)]
    pub can_delete: bool,
}

impl Song {
    /// Deterministic identifier for a Jamendo track.
    pub fn jamendo_song_id(jamendo_id: &str) -> String {
        format!("{}-{}", JAMENDO_ID_PREFIX, jamendo_id)
    }
}

/// The fixed sample songs every visitor sees, in display order.
pub fn builtin_samples() -> Vec<Song> {
    vec![
        sample("sample-1", "Creative Minds", "Royalty Free", "sample1.mp3", "cover1.jpg", 146),
        sample("sample-2", "A New Beginning", "Inspiring", "sample2.mp3", "cover2.jpg", 150),
    ]
}

fn sample(id: &str, title: &str, album: &str, file: &str, cover: &str, duration: i64) -> Song {
    Song {
        id: id.to_string(),
        user_id: None,
        title: title.to_string(),
        artist: "Bensound".to_string(),
        album: album.to_string(),
        file_path: format!("/assets/audio/{}", file),
        cover_path: format!("/static/images/{}", cover),
        is_local: true,
        is_uploaded: false,
        jamendo_id: None,
        duration,
        is_liked: false,
        can_delete: false,
    }
}

/// Song description a client submits when liking a track that may not be
/// stored yet.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct SongCandidate {
    pub song_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub file_path: String,
    pub cover_path: String,
    pub duration: i64,
    pub is_local: bool,
    pub jamendo_id: Option<String>,
}

impl SongCandidate {
    /// External source id, ignoring blank values.
    pub fn external_id(&self) -> Option<&str> {
        self.jamendo_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Metadata accompanying an uploaded audio file.
#[derive(Clone, Debug, Default)]
pub struct UploadMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_serializes_in_camel_case_without_empty_optionals() {
        let json = serde_json::to_value(&builtin_samples()[0]).unwrap();
        assert_eq!(json["filePath"], "/assets/audio/sample1.mp3");
        assert_eq!(json["isLiked"], false);
        assert!(json.get("userId").is_none());
        assert!(json.get("jamendoId").is_none());
    }

    #[test]
    fn blank_external_id_is_ignored() {
        let candidate = SongCandidate {
            jamendo_id: Some("  ".into()),
            ..SongCandidate::default()
        };
        assert_eq!(candidate.external_id(), None);
    }

    #[test]
    fn candidate_accepts_partial_bodies() {
        let candidate: SongCandidate =
            serde_json::from_str(r#"{"songId":"jamendo-42","jamendoId":"42"}"#).unwrap();
        assert_eq!(candidate.song_id, "jamendo-42");
        assert_eq!(candidate.external_id(), Some("42"));
        assert!(!candidate.is_local);
    }
}
