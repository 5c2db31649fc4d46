//! Wire shapes of the Jamendo tracks API.

use serde::Deserialize;

use super::song::{DEFAULT_COVER_PATH, Song};

/// Envelope returned by `GET /v3.0/tracks/`.
#[derive(Deserialize, Debug)]
pub struct JamendoResponse {
    pub headers: JamendoHeaders,
    #[serde(default)]
    pub results: Vec<JamendoTrack>,
}

#[derive(Deserialize, Debug)]
pub struct JamendoHeaders {
    pub status: String,
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub error_message: String,
}

#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct JamendoTrack {
    pub id: String,
    pub name: String,
    pub duration: i64,
    pub artist_name: String,
    pub album_name: String,
    pub audio: String,
    pub audiodownload: String,
    pub image: String,
}

impl JamendoTrack {
    /// Convert to a Song; tracks without any playable URL yield `None`.
    pub fn into_song(self) -> Option<Song> {
        let file_path = if !self.audio.is_empty() {
            self.audio
        } else if !self.audiodownload.is_empty() {
            self.audiodownload
        } else {
            return None;
        };
        let cover_path = if self.image.is_empty() {
            DEFAULT_COVER_PATH.to_string()
        } else {
            self.image
        };

        Some(Song {
            id: Song::jamendo_song_id(&self.id),
            user_id: None,
            title: self.name,
            artist: self.artist_name,
            album: self.album_name,
            file_path,
            cover_path,
            is_local: false,
            is_uploaded: false,
            jamendo_id: Some(self.id),
            duration: self.duration,
            is_liked: false,
            can_delete: false,
        })
    }
}
