//! Jamendo API client used by track search.
//!
//! One read-only GET per search; no retries.

use crate::models::{jamendo::JamendoResponse, song::Song};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info};

const SEARCH_LIMIT: &str = "50";
const IMAGE_SIZE: &str = "300";

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search provider is not configured")]
    NotConfigured,
    #[error("search request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("search provider returned HTTP {0}")]
    Status(u16),
    #[error("search provider reported `{status}`: {message}")]
    Rejected { status: String, message: String },
}

#[derive(Clone)]
pub struct JamendoClient {
    client: Client,
    base_url: String,
    client_id: Option<String>,
}

impl JamendoClient {
    pub fn new(
        base_url: impl Into<String>,
        client_id: Option<String>,
        timeout: Duration,
    ) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            client_id,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.client_id.is_some()
    }

    /// Search tracks and convert them to songs. Tracks without a playable
    /// URL are dropped.
    pub async fn search_tracks(&self, query: &str) -> Result<Vec<Song>, SearchError> {
        let client_id = self.client_id.as_deref().ok_or(SearchError::NotConfigured)?;

        info!("calling Jamendo API for query {:?}", query);
        let response = self
            .client
            .get(&self.base_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[
                ("client_id", client_id),
                ("format", "json"),
                ("limit", SEARCH_LIMIT),
                ("search", query),
                ("imagesize", IMAGE_SIZE),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Jamendo API returned {}: {}", status, body);
            return Err(SearchError::Status(status.as_u16()));
        }

        let envelope: JamendoResponse = response.json().await?;
        let songs = songs_from_envelope(envelope)?;
        info!("Jamendo search for {:?} yielded {} results", query, songs.len());
        Ok(songs)
    }
}

/// Validate the envelope status and map its tracks.
pub fn songs_from_envelope(envelope: JamendoResponse) -> Result<Vec<Song>, SearchError> {
    if envelope.headers.status != "success" {
        return Err(SearchError::Rejected {
            status: envelope.headers.status,
            message: envelope.headers.error_message,
        });
    }
    Ok(envelope
        .results
        .into_iter()
        .filter_map(|track| track.into_song())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Query, http::StatusCode, routing::get};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use tokio::net::TcpListener;

    /// Serve a fake tracks API on a random local port and return its base URL.
    async fn spawn_provider() -> String {
        let app = Router::new()
            .route(
                "/tracks/",
                get(|Query(params): Query<HashMap<String, String>>| async move {
                    let expected = [
                        ("client_id", "test-client"),
                        ("format", "json"),
                        ("limit", "50"),
                        ("imagesize", "300"),
                    ];
                    if expected
                        .iter()
                        .any(|(k, v)| params.get(*k).map(String::as_str) != Some(*v))
                    {
                        return (StatusCode::BAD_REQUEST, Json(Value::Null));
                    }
                    let search = params.get("search").cloned().unwrap_or_default();
                    (
                        StatusCode::OK,
                        Json(json!({
                            "headers": {"status": "success", "code": 0},
                            "results": [
                                {"id": "7", "name": search, "audio": "https://a/7.mp3", "duration": 120}
                            ]
                        })),
                    )
                }),
            )
            .route(
                "/broken/",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
            )
            .route(
                "/failed/",
                get(|| async {
                    Json(json!({
                        "headers": {"status": "failed", "code": 5, "error_message": "bad client id"},
                        "results": []
                    }))
                }),
            )
            .route(
                "/slow/",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Json(json!({"headers": {"status": "success"}, "results": []}))
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client_for(base: &str, path: &str, timeout: Duration) -> JamendoClient {
        JamendoClient::new(
            format!("{}{}", base, path),
            Some("test-client".into()),
            timeout,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn successful_search_maps_tracks() {
        let base = spawn_provider().await;
        let client = client_for(&base, "/tracks/", Duration::from_secs(5));

        let songs = client.search_tracks("night drive").await.unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].id, "jamendo-7");
        assert_eq!(songs[0].title, "night drive");
        assert!(!songs[0].is_local);
    }

    #[tokio::test]
    async fn http_error_status_is_an_upstream_failure() {
        let base = spawn_provider().await;
        let client = client_for(&base, "/broken/", Duration::from_secs(5));

        assert!(matches!(
            client.search_tracks("anything").await,
            Err(SearchError::Status(500))
        ));
    }

    #[tokio::test]
    async fn failed_envelope_is_an_upstream_failure() {
        let base = spawn_provider().await;
        let client = client_for(&base, "/failed/", Duration::from_secs(5));

        assert!(matches!(
            client.search_tracks("anything").await,
            Err(SearchError::Rejected { status, .. }) if status == "failed"
        ));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let base = spawn_provider().await;
        let client = client_for(&base, "/slow/", Duration::from_millis(300));

        assert!(matches!(
            client.search_tracks("anything").await,
            Err(SearchError::Transport(err)) if err.is_timeout()
        ));
    }

    fn envelope(raw: &str) -> JamendoResponse {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn failed_status_is_rejected() {
        let resp = envelope(
            r#"{"headers": {"status": "failed", "code": 5, "error_message": "bad client id"},
                "results": []}"#,
        );
        assert!(matches!(
            songs_from_envelope(resp),
            Err(SearchError::Rejected { message, .. }) if message == "bad client id"
        ));
    }

    #[test]
    fn unplayable_tracks_are_dropped() {
        let resp = envelope(
            r#"{"headers": {"status": "success"},
                "results": [
                    {"id": "1", "name": "ok", "audio": "https://a/1"},
                    {"id": "2", "name": "silent"}
                ]}"#,
        );
        let songs = songs_from_envelope(resp).unwrap();
        assert_eq!(songs.len(), 1);
        assert_eq!(songs[0].id, "jamendo-1");
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_to_search() {
        let client =
            JamendoClient::new("http://127.0.0.1:9/", None, Duration::from_secs(1)).unwrap();
        assert!(!client.is_configured());
        assert!(matches!(
            client.search_tracks("anything").await,
            Err(SearchError::NotConfigured)
        ));
    }
}
