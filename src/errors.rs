use crate::services::{
    jamendo_client::SearchError, library_service::LibraryError, token_codec::TokenError,
    user_service::UserError,
};
use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// Message returned for every authentication failure, whatever the cause.
pub const UNAUTHORIZED_MESSAGE: &str = "unauthorized";

/// Message returned when login credentials do not match.
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid username or password";

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }

    /// Uniform 401; never says why authentication failed.
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, UNAUTHORIZED_MESSAGE)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("unhandled error: {:#}", err);
        AppError::internal("internal server error")
    }
}

impl From<LibraryError> for AppError {
    fn from(err: LibraryError) -> Self {
        match err {
            LibraryError::InvalidInput(msg) => AppError::bad_request(msg),
            LibraryError::NotFound(_) => AppError::not_found("song not found"),
            LibraryError::Forbidden => AppError::new(
                StatusCode::FORBIDDEN,
                "song not found or not owned by you",
            ),
            other => {
                tracing::error!("library operation failed: {}", other);
                AppError::internal("internal server error")
            }
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::UsernameTaken(_) => {
                AppError::new(StatusCode::CONFLICT, "Username already taken")
            }
            other => {
                tracing::error!("user operation failed: {}", other);
                AppError::internal("internal server error")
            }
        }
    }
}

impl From<TokenError> for AppError {
    fn from(_: TokenError) -> Self {
        AppError::unauthorized()
    }
}

impl From<SearchError> for AppError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::NotConfigured => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "search is not configured")
            }
            other => {
                tracing::error!("search provider failure: {}", other);
                AppError::new(StatusCode::BAD_GATEWAY, "search provider request failed")
            }
        }
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!("multipart read failed: {}", err.body_text());
            return AppError::internal("internal server error");
        }
        AppError::new(status, err.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(rejection.status(), rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::new(rejection.status(), rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_details_are_not_leaked() {
        let err: AppError = LibraryError::Io(std::io::Error::other("disk on fire")).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("disk"));
    }

    #[test]
    fn ownership_failure_maps_to_forbidden() {
        let err: AppError = LibraryError::Forbidden.into();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn token_failures_are_uniform() {
        let err: AppError = TokenError::Invalid.into();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.message, UNAUTHORIZED_MESSAGE);
    }

    #[test]
    fn upstream_status_maps_to_bad_gateway() {
        let err: AppError = SearchError::Status(503).into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn failed_credential_task_is_a_server_error() {
        let join_err = tokio::spawn(async { panic!("verifier crashed") })
            .await
            .unwrap_err();
        let err: AppError = UserError::from(join_err).into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("verifier"));
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let err: AppError = UserError::UsernameTaken("alice".into()).into();
        assert_eq!(err.status, StatusCode::CONFLICT);
    }
}
