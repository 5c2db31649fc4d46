//! LibraryService: song catalog, likes and uploads backed by SQLite for
//! metadata and local disk for uploaded audio stored beneath
//! `upload_dir/{user_id}/{uuid}.{ext}`.

use crate::{
    models::song::{EXTERNAL_ID_PREFIX, Song, SongCandidate, UPLOAD_ID_PREFIX, UploadMetadata},
    services::catalog::{self, ViewerLibrary},
};
use bytes::Bytes;
use futures::{Stream, StreamExt, pin_mut};
use sqlx::{SqliteConnection, SqlitePool};
use std::{
    io::{self, ErrorKind},
    path::{Component, Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

/// URL prefix under which uploaded files are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

const AUDIO_EXTENSIONS: [&str; 8] = ["mp3", "ogg", "oga", "wav", "flac", "m4a", "aac", "opus"];

const SONG_COLUMNS: &str = "id, user_id, title, artist, album, file_path, cover_path, \
                            is_local, is_uploaded, jamendo_id, duration";

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("song `{0}` not found")]
    NotFound(String),
    #[error("song not found or not owned by caller")]
    Forbidden,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type LibraryResult<T> = Result<T, LibraryError>;

/// An audio file written to disk but not yet recorded in the catalog.
#[derive(Debug)]
pub struct StoredUpload {
    pub song_id: String,
    pub disk_path: PathBuf,
    pub public_path: String,
    pub size_bytes: i64,
}

/// How a like candidate maps onto the `songs` table.
enum Resolution {
    Existing(String),
    Create(Song),
}

/// LibraryService provides the catalog operations:
/// - Assemble the per-viewer song list
/// - Materialize external songs on first like, and like/unlike them
/// - Upload audio (streams bytes to disk and inserts metadata into SQLite)
/// - Delete an upload (likes and song row in one transaction, then the file)
#[derive(Clone)]
pub struct LibraryService {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where uploaded audio is stored.
    pub upload_dir: PathBuf,

    /// Built-in sample songs, read-only after startup.
    samples: Arc<[Song]>,
}

impl LibraryService {
    /// Create a new LibraryService backed by the provided SQLite pool,
    /// using `upload_dir` as the root directory for uploaded audio.
    pub fn new(db: Arc<SqlitePool>, upload_dir: impl Into<PathBuf>, samples: Vec<Song>) -> Self {
        Self {
            db,
            upload_dir: upload_dir.into(),
            samples: samples.into(),
        }
    }

    /// The song list visible to `viewer` (anonymous when `None`).
    pub async fn songs_for_viewer(&self, viewer: Option<i64>) -> LibraryResult<Vec<Song>> {
        let library = match viewer {
            None => None,
            Some(user_id) => Some(ViewerLibrary {
                uploads: self.fetch_uploads(user_id).await?,
                liked: self.fetch_liked(user_id).await?,
            }),
        };
        Ok(catalog::aggregate(&self.samples, library))
    }

    async fn fetch_uploads(&self, user_id: i64) -> LibraryResult<Vec<Song>> {
        let songs = sqlx::query_as::<_, Song>(&format!(
            "SELECT {SONG_COLUMNS} FROM songs
             WHERE user_id = ? AND is_uploaded = 1
             ORDER BY rowid ASC"
        ))
        .bind(user_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(songs)
    }

    async fn fetch_liked(&self, user_id: i64) -> LibraryResult<Vec<Song>> {
        let songs = sqlx::query_as::<_, Song>(
            "SELECT s.id, s.user_id, s.title, s.artist, s.album, s.file_path, s.cover_path,
                    s.is_local, s.is_uploaded, s.jamendo_id, s.duration
             FROM user_liked_songs uls
             JOIN songs s ON s.id = uls.song_id
             WHERE uls.user_id = ?
             ORDER BY uls.rowid ASC",
        )
        .bind(user_id)
        .fetch_all(&*self.db)
        .await?;
        Ok(songs)
    }

    /// Fetch a stored song by identifier.
    pub async fn get_song(&self, song_id: &str) -> LibraryResult<Option<Song>> {
        let song = sqlx::query_as::<_, Song>(&format!(
            "SELECT {SONG_COLUMNS} FROM songs WHERE id = ?"
        ))
        .bind(song_id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(song)
    }

    /// Resolve `candidate` to a persisted song identifier, inserting a row
    /// when none exists yet.
    pub async fn ensure_song_exists(&self, candidate: &SongCandidate) -> LibraryResult<String> {
        match self.resolve_candidate(candidate).await? {
            Resolution::Existing(id) => Ok(id),
            Resolution::Create(song) => {
                let mut tx = self.db.begin().await?;
                let id = materialize(&mut *tx, &song).await?;
                tx.commit().await?;
                Ok(id)
            }
        }
    }

    /// Like a song, materializing it first if needed. Both steps commit
    /// together. Returns the persisted song identifier.
    pub async fn like_song(&self, user_id: i64, candidate: &SongCandidate) -> LibraryResult<String> {
        let resolution = self.resolve_candidate(candidate).await?;

        let mut tx = self.db.begin().await?;
        let song_id = match resolution {
            Resolution::Existing(id) => id,
            Resolution::Create(song) => materialize(&mut *tx, &song).await?,
        };

        let inserted = sqlx::query(
            "INSERT INTO user_liked_songs (user_id, song_id) VALUES (?, ?)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(&song_id)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            // The song vanished between lookup and like.
            Err(err) if is_foreign_key_violation(&err) => {
                return Err(LibraryError::NotFound(song_id));
            }
            Err(err) => return Err(err.into()),
        }

        tx.commit().await?;
        debug!("user {} liked song {}", user_id, song_id);
        Ok(song_id)
    }

    /// Remove a like. Unliking a song that is not liked is a no-op.
    pub async fn unlike_song(&self, user_id: i64, song_id: &str) -> LibraryResult<()> {
        let result = sqlx::query("DELETE FROM user_liked_songs WHERE user_id = ? AND song_id = ?")
            .bind(user_id)
            .bind(song_id)
            .execute(&*self.db)
            .await?;
        debug!(
            "user {} unliked song {} ({} rows)",
            user_id,
            song_id,
            result.rows_affected()
        );
        Ok(())
    }

    /// Decide whether the candidate names an existing row or needs one.
    ///
    /// Lookup order: external source id, then the supplied identifier.
    /// A local song must carry an identifier, and a local identifier that
    /// is not stored can only be materialized from the built-in samples.
    async fn resolve_candidate(&self, candidate: &SongCandidate) -> LibraryResult<Resolution> {
        if let Some(external_id) = candidate.external_id() {
            if let Some(id) = find_id_by_jamendo_id(&*self.db, external_id).await? {
                return Ok(Resolution::Existing(id));
            }
            let mut song = candidate_song(candidate, Song::jamendo_song_id(external_id));
            song.jamendo_id = Some(external_id.to_string());
            return Ok(Resolution::Create(song));
        }

        let song_id = candidate.song_id.trim();
        if song_id.is_empty() {
            if candidate.is_local {
                return Err(LibraryError::InvalidInput(
                    "local songs must carry an identifier".into(),
                ));
            }
            let id = format!("{}-{}", EXTERNAL_ID_PREFIX, Uuid::new_v4());
            return Ok(Resolution::Create(candidate_song(candidate, id)));
        }

        if let Some(id) = find_id(&*self.db, song_id).await? {
            return Ok(Resolution::Existing(id));
        }

        // Sample identifiers always map to the canonical sample record.
        if let Some(sample) = self.samples.iter().find(|s| s.id == song_id) {
            return Ok(Resolution::Create(sample.clone()));
        }
        if candidate.is_local {
            return Err(LibraryError::NotFound(song_id.to_string()));
        }

        Ok(Resolution::Create(candidate_song(
            candidate,
            song_id.to_string(),
        )))
    }

    /// Stream an uploaded audio file to disk.
    ///
    /// - Writes bytes incrementally to a temporary file.
    /// - Atomically renames into `upload_dir/{user_id}/{uuid}.{ext}`.
    ///
    /// Cleans up the temporary file on any error.
    pub async fn store_upload_stream<S>(
        &self,
        user_id: i64,
        original_filename: &str,
        stream: S,
    ) -> LibraryResult<StoredUpload>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let extension = audio_extension(original_filename)?;
        let file_id = Uuid::new_v4();
        let file_name = format!("{}.{}", file_id, extension);

        let user_dir = self.user_dir(user_id);
        fs::create_dir_all(&user_dir).await?;
        let file_path = user_dir.join(&file_name);
        let tmp_path = user_dir.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(LibraryError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(LibraryError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(LibraryError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(LibraryError::Io(err));
        }
        drop(file);

        if size_bytes == 0 {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(LibraryError::InvalidInput("uploaded file is empty".into()));
        }

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(LibraryError::Io(err));
        }

        Ok(StoredUpload {
            song_id: format!("{}-{}", UPLOAD_ID_PREFIX, file_id),
            disk_path: file_path,
            public_path: format!("{}/{}/{}", UPLOADS_ROUTE, user_id, file_name),
            size_bytes,
        })
    }

    /// Record a stored file as a song owned by `user_id`.
    ///
    /// Removes the file again if the metadata insert fails.
    pub async fn record_upload(
        &self,
        user_id: i64,
        stored: StoredUpload,
        metadata: UploadMetadata,
        cover_path: &str,
    ) -> LibraryResult<Song> {
        let insert_result = sqlx::query_as::<_, Song>(&format!(
            "INSERT INTO songs (
                id, user_id, title, artist, album, file_path, cover_path,
                is_local, is_uploaded, jamendo_id, duration
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 1, 1, NULL, ?)
            RETURNING {SONG_COLUMNS}"
        ))
        .bind(&stored.song_id)
        .bind(user_id)
        .bind(&metadata.title)
        .bind(&metadata.artist)
        .bind(&metadata.album)
        .bind(&stored.public_path)
        .bind(cover_path)
        .bind(metadata.duration)
        .fetch_one(&*self.db)
        .await;

        match insert_result {
            Ok(mut song) => {
                song.can_delete = true;
                info!(
                    "user {} uploaded song {} ({} bytes)",
                    user_id, song.id, stored.size_bytes
                );
                Ok(song)
            }
            Err(err) => {
                self.discard_upload(&stored).await;
                Err(LibraryError::Sqlx(err))
            }
        }
    }

    /// Remove a stored file that will not be recorded.
    pub async fn discard_upload(&self, stored: &StoredUpload) {
        self.remove_file_best_effort(&stored.disk_path).await;
    }

    /// Delete an upload owned by `user_id`.
    ///
    /// - Verifies ownership before mutating anything
    /// - Removes like rows and the song row in one transaction
    /// - Deletes the audio file best-effort and prunes the empty user folder
    ///
    /// Missing songs, non-uploads and songs owned by someone else all yield
    /// `Forbidden`, so callers cannot probe for other users' uploads.
    pub async fn delete_uploaded_song(&self, user_id: i64, song_id: &str) -> LibraryResult<Song> {
        let song = sqlx::query_as::<_, Song>(&format!(
            "SELECT {SONG_COLUMNS} FROM songs WHERE id = ? AND is_uploaded = 1"
        ))
        .bind(song_id)
        .fetch_optional(&*self.db)
        .await?;

        let song = match song {
            Some(song) if song.user_id == Some(user_id) => song,
            _ => return Err(LibraryError::Forbidden),
        };

        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM user_liked_songs WHERE song_id = ?")
            .bind(song_id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM songs WHERE id = ? AND user_id = ?")
            .bind(song_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(LibraryError::Forbidden);
        }
        tx.commit().await?;

        match self.disk_path_for(&song.file_path) {
            Some(path) => self.remove_file_best_effort(&path).await,
            None => debug!("song {} has no local file to remove", song.id),
        }

        info!("user {} deleted song {}", user_id, song_id);
        Ok(song)
    }

    fn user_dir(&self, user_id: i64) -> PathBuf {
        self.upload_dir.join(user_id.to_string())
    }

    /// Map a public `/uploads/...` path back to its location on disk.
    ///
    /// Returns `None` for paths outside the upload route or containing
    /// anything but plain components.
    fn disk_path_for(&self, public_path: &str) -> Option<PathBuf> {
        let relative = public_path
            .strip_prefix(UPLOADS_ROUTE)?
            .trim_start_matches('/');
        let relative = Path::new(relative);
        if relative.as_os_str().is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.upload_dir.join(relative))
    }

    async fn remove_file_best_effort(&self, path: &Path) {
        match fs::remove_file(path).await {
            Ok(_) => debug!("removed file {}", path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", path.display());
            }
            Err(err) => {
                tracing::warn!("failed to remove file {}: {}", path.display(), err);
                return;
            }
        }
        if let Some(parent) = path.parent() {
            self.prune_empty_dirs(parent, &self.upload_dir).await;
        }
    }

    /// Recursively remove empty directories up to the upload root.
    ///
    /// Stops when:
    /// - directory not empty
    /// - directory not found
    /// - reached root
    /// - encountered unexpected I/O errors
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Insert `song` unless a row with its id or external id already exists,
/// then read back the identifier that owns the external id. Concurrent
/// first-likes of the same track therefore agree on one row.
async fn materialize(conn: &mut SqliteConnection, song: &Song) -> LibraryResult<String> {
    sqlx::query(
        "INSERT INTO songs (
            id, user_id, title, artist, album, file_path, cover_path,
            is_local, is_uploaded, jamendo_id, duration
        ) VALUES (?, NULL, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        ON CONFLICT DO NOTHING",
    )
    .bind(&song.id)
    .bind(&song.title)
    .bind(&song.artist)
    .bind(&song.album)
    .bind(&song.file_path)
    .bind(&song.cover_path)
    .bind(song.is_local)
    .bind(&song.jamendo_id)
    .bind(song.duration)
    .execute(&mut *conn)
    .await?;

    if let Some(external_id) = song.jamendo_id.as_deref() {
        if let Some(id) = find_id_by_jamendo_id(&mut *conn, external_id).await? {
            return Ok(id);
        }
    }
    find_id(&mut *conn, &song.id)
        .await?
        .ok_or_else(|| LibraryError::NotFound(song.id.clone()))
}

async fn find_id<'e, E>(executor: E, song_id: &str) -> LibraryResult<Option<String>>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let id = sqlx::query_scalar::<_, String>("SELECT id FROM songs WHERE id = ?")
        .bind(song_id)
        .fetch_optional(executor)
        .await?;
    Ok(id)
}

async fn find_id_by_jamendo_id<'e, E>(executor: E, jamendo_id: &str) -> LibraryResult<Option<String>>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let id = sqlx::query_scalar::<_, String>("SELECT id FROM songs WHERE jamendo_id = ?")
        .bind(jamendo_id)
        .fetch_optional(executor)
        .await?;
    Ok(id)
}

fn candidate_song(candidate: &SongCandidate, id: String) -> Song {
    Song {
        id,
        user_id: None,
        title: candidate.title.clone(),
        artist: candidate.artist.clone(),
        album: candidate.album.clone(),
        file_path: candidate.file_path.clone(),
        cover_path: candidate.cover_path.clone(),
        is_local: candidate.is_local,
        is_uploaded: false,
        jamendo_id: None,
        duration: candidate.duration,
        is_liked: false,
        can_delete: false,
    }
}

/// Lowercased extension of an uploaded file, restricted to audio formats.
fn audio_extension(filename: &str) -> LibraryResult<String> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(LibraryError::InvalidInput(format!(
            "unsupported audio file type; expected one of: {}",
            AUDIO_EXTENSIONS.join(", ")
        )))
    }
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("foreign key")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{migrations, models::song::builtin_samples};
    use futures::stream;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    async fn setup() -> (LibraryService, TempDir) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrations::run(&pool).await.unwrap();
        for name in ["alice", "bob"] {
            sqlx::query("INSERT INTO users (username, password_hash, created_at) VALUES (?, 'x', ?)")
                .bind(name)
                .bind(chrono::Utc::now())
                .execute(&pool)
                .await
                .unwrap();
        }
        let dir = TempDir::new().unwrap();
        let service = LibraryService::new(Arc::new(pool), dir.path(), builtin_samples());
        (service, dir)
    }

    const ALICE: i64 = 1;
    const BOB: i64 = 2;

    fn jamendo_candidate(id: &str) -> SongCandidate {
        SongCandidate {
            song_id: format!("jamendo-{}", id),
            title: "Far Away".into(),
            artist: "Somebody".into(),
            album: "Somewhere".into(),
            file_path: format!("https://cdn.example/{}.mp3", id),
            cover_path: "https://cdn.example/cover.jpg".into(),
            duration: 180,
            is_local: false,
            jamendo_id: Some(id.into()),
        }
    }

    async fn upload(service: &LibraryService, user_id: i64, title: &str) -> Song {
        let body = stream::iter(vec![
            Ok::<_, io::Error>(Bytes::from_static(b"ID3")),
            Ok(Bytes::from_static(b"audio-bytes")),
        ]);
        let stored = service
            .store_upload_stream(user_id, "track.MP3", body)
            .await
            .unwrap();
        service
            .record_upload(
                user_id,
                stored,
                UploadMetadata {
                    title: title.into(),
                    artist: "me".into(),
                    album: String::new(),
                    duration: 42,
                },
                "/static/images/default-cover.jpg",
            )
            .await
            .unwrap()
    }

    async fn count(service: &LibraryService, sql: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(sql)
            .fetch_one(&*service.db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn anonymous_viewer_gets_samples() {
        let (service, _dir) = setup().await;
        let songs = service.songs_for_viewer(None).await.unwrap();
        assert_eq!(songs, builtin_samples());
    }

    #[tokio::test]
    async fn upload_and_liked_sample_are_merged() {
        let (service, _dir) = setup().await;
        let uploaded = upload(&service, ALICE, "Mine").await;
        let sample_like = SongCandidate {
            song_id: "sample-1".into(),
            is_local: true,
            ..SongCandidate::default()
        };
        assert_eq!(service.like_song(ALICE, &sample_like).await.unwrap(), "sample-1");

        let songs = service.songs_for_viewer(Some(ALICE)).await.unwrap();
        let ids: Vec<&str> = songs.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["sample-1", "sample-2", uploaded.id.as_str()]);
        assert!(songs[0].is_liked);
        assert!(songs[2].is_uploaded && songs[2].can_delete);

        // The materialized sample row carries the canonical sample data.
        let stored = service.get_song("sample-1").await.unwrap().unwrap();
        assert_eq!(stored.title, "Creative Minds");
    }

    #[tokio::test]
    async fn repeated_first_likes_resolve_to_one_row() {
        let (service, _dir) = setup().await;
        let candidate = jamendo_candidate("1234");

        let (a, b) = tokio::join!(
            service.like_song(ALICE, &candidate),
            service.like_song(BOB, &candidate)
        );
        assert_eq!(a.unwrap(), "jamendo-1234");
        assert_eq!(b.unwrap(), "jamendo-1234");
        service.like_song(ALICE, &candidate).await.unwrap();

        assert_eq!(
            count(&service, "SELECT COUNT(*) FROM songs WHERE jamendo_id = '1234'").await,
            1
        );
        assert_eq!(count(&service, "SELECT COUNT(*) FROM user_liked_songs").await, 2);

        let songs = service.songs_for_viewer(Some(BOB)).await.unwrap();
        assert_eq!(songs.last().unwrap().id, "jamendo-1234");
        assert!(songs.last().unwrap().is_liked);
    }

    #[tokio::test]
    async fn external_id_wins_over_supplied_identifier() {
        let (service, _dir) = setup().await;
        let first = service
            .ensure_song_exists(&jamendo_candidate("9"))
            .await
            .unwrap();
        let mut renamed = jamendo_candidate("9");
        renamed.song_id = "something-else".into();

        assert_eq!(service.ensure_song_exists(&renamed).await.unwrap(), first);
    }

    #[tokio::test]
    async fn external_song_without_any_id_gets_random_identifier() {
        let (service, _dir) = setup().await;
        let candidate = SongCandidate {
            title: "Stream".into(),
            file_path: "https://radio.example/live".into(),
            ..SongCandidate::default()
        };
        let id = service.ensure_song_exists(&candidate).await.unwrap();
        assert!(id.starts_with("external-"));
        assert!(service.get_song(&id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn local_song_requires_known_identifier() {
        let (service, _dir) = setup().await;
        let anonymous_local = SongCandidate {
            is_local: true,
            ..SongCandidate::default()
        };
        assert!(matches!(
            service.ensure_song_exists(&anonymous_local).await,
            Err(LibraryError::InvalidInput(_))
        ));

        let unknown_local = SongCandidate {
            song_id: "local-does-not-exist".into(),
            is_local: true,
            ..SongCandidate::default()
        };
        assert!(matches!(
            service.like_song(ALICE, &unknown_local).await,
            Err(LibraryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn sample_identifier_materializes_canonical_record() {
        let (service, _dir) = setup().await;
        let spoofed = SongCandidate {
            song_id: "sample-2".into(),
            title: "Not the sample".into(),
            file_path: "https://elsewhere.example/x.mp3".into(),
            ..SongCandidate::default()
        };

        let id = service.ensure_song_exists(&spoofed).await.unwrap();
        let stored = service.get_song(&id).await.unwrap().unwrap();
        assert_eq!(stored, builtin_samples()[1]);
    }

    #[tokio::test]
    async fn unlike_is_idempotent() {
        let (service, _dir) = setup().await;
        service.like_song(ALICE, &jamendo_candidate("5")).await.unwrap();

        service.unlike_song(ALICE, "sample-2").await.unwrap();
        assert_eq!(count(&service, "SELECT COUNT(*) FROM user_liked_songs").await, 1);

        service.unlike_song(ALICE, "jamendo-5").await.unwrap();
        service.unlike_song(ALICE, "jamendo-5").await.unwrap();
        assert_eq!(count(&service, "SELECT COUNT(*) FROM user_liked_songs").await, 0);
    }

    #[tokio::test]
    async fn delete_by_non_owner_is_forbidden_and_changes_nothing() {
        let (service, _dir) = setup().await;
        let song = upload(&service, ALICE, "Mine").await;
        let liked = SongCandidate {
            song_id: song.id.clone(),
            is_local: true,
            ..SongCandidate::default()
        };
        service.like_song(BOB, &liked).await.unwrap();

        assert!(matches!(
            service.delete_uploaded_song(BOB, &song.id).await,
            Err(LibraryError::Forbidden)
        ));
        assert!(service.get_song(&song.id).await.unwrap().is_some());
        assert_eq!(count(&service, "SELECT COUNT(*) FROM user_liked_songs").await, 1);
        assert!(service.disk_path_for(&song.file_path).unwrap().exists());
    }

    #[tokio::test]
    async fn delete_of_missing_or_sample_song_is_forbidden() {
        let (service, _dir) = setup().await;
        service
            .ensure_song_exists(&SongCandidate {
                song_id: "sample-1".into(),
                is_local: true,
                ..SongCandidate::default()
            })
            .await
            .unwrap();

        for id in ["sample-1", "local-missing"] {
            assert!(matches!(
                service.delete_uploaded_song(ALICE, id).await,
                Err(LibraryError::Forbidden)
            ));
        }
    }

    #[tokio::test]
    async fn delete_by_owner_removes_song_likes_and_file() {
        let (service, _dir) = setup().await;
        let song = upload(&service, ALICE, "Mine").await;
        let disk_path = service.disk_path_for(&song.file_path).unwrap();
        let liked = SongCandidate {
            song_id: song.id.clone(),
            is_local: true,
            ..SongCandidate::default()
        };
        service.like_song(ALICE, &liked).await.unwrap();
        service.like_song(BOB, &liked).await.unwrap();

        service.delete_uploaded_song(ALICE, &song.id).await.unwrap();

        assert!(service.get_song(&song.id).await.unwrap().is_none());
        assert_eq!(count(&service, "SELECT COUNT(*) FROM user_liked_songs").await, 0);
        assert!(!disk_path.exists());
        assert!(!service.user_dir(ALICE).exists());
        for viewer in [Some(ALICE), Some(BOB), None] {
            let songs = service.songs_for_viewer(viewer).await.unwrap();
            assert!(songs.iter().all(|s| s.id != song.id));
        }
    }

    #[tokio::test]
    async fn upload_is_namespaced_by_user() {
        let (service, dir) = setup().await;
        let song = upload(&service, BOB, "Theirs").await;

        assert!(song.id.starts_with("local-"));
        assert!(song.file_path.starts_with("/uploads/2/"));
        assert!(song.file_path.ends_with(".mp3"));
        let on_disk = service.disk_path_for(&song.file_path).unwrap();
        assert!(on_disk.starts_with(dir.path().join("2")));
        assert_eq!(std::fs::read(on_disk).unwrap(), b"ID3audio-bytes");
    }

    #[tokio::test]
    async fn rejected_uploads_leave_no_files() {
        let (service, dir) = setup().await;
        let empty = stream::iter(Vec::<io::Result<Bytes>>::new());
        assert!(matches!(
            service.store_upload_stream(ALICE, "empty.mp3", empty).await,
            Err(LibraryError::InvalidInput(_))
        ));

        let failing = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("client went away")),
        ]);
        assert!(matches!(
            service.store_upload_stream(ALICE, "broken.mp3", failing).await,
            Err(LibraryError::Io(_))
        ));

        let not_audio = stream::iter(vec![Ok(Bytes::from_static(b"MZ"))]);
        assert!(matches!(
            service.store_upload_stream(ALICE, "setup.exe", not_audio).await,
            Err(LibraryError::InvalidInput(_))
        ));

        let user_dir = dir.path().join("1");
        let leftovers = std::fs::read_dir(&user_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn disk_path_rejects_traversal() {
        let (service, dir) = setup().await;
        assert_eq!(
            service.disk_path_for("/uploads/1/a.mp3"),
            Some(dir.path().join("1").join("a.mp3"))
        );
        assert_eq!(service.disk_path_for("/uploads/../etc/passwd"), None);
        assert_eq!(service.disk_path_for("/assets/audio/sample1.mp3"), None);
        assert_eq!(service.disk_path_for("/uploads/"), None);
    }
}
