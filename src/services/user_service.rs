//! Account registration and credential checks.

use crate::{
    models::user::User,
    services::credentials::{self, HashError},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tokio::task::JoinError;
use tracing::{info, warn};

/// Digest verified against when the username is unknown, so a miss costs
/// the same argon2 work as a wrong password.
static UNKNOWN_USER_DIGEST: OnceLock<String> = OnceLock::new();

#[derive(Debug, Error)]
pub enum UserError {
    #[error("username `{0}` already taken")]
    UsernameTaken(String),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("credential task failed: {0}")]
    Task(#[from] JoinError),
}

pub type UserResult<T> = Result<T, UserError>;

#[derive(Clone)]
pub struct UserService {
    db: Arc<SqlitePool>,
}

impl UserService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Create an account. The unique index on `username` decides races
    /// between concurrent registrations.
    pub async fn register(&self, username: &str, password: &str) -> UserResult<User> {
        if self.find_by_username(username).await?.is_some() {
            return Err(UserError::UsernameTaken(username.to_string()));
        }
        let password_hash = hash_blocking(password.to_string()).await?;

        let inserted = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?, ?, ?)
             RETURNING id, username, password_hash, created_at",
        )
        .bind(username)
        .bind(&password_hash)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match inserted {
            Ok(user) => {
                info!("registered user {} ({})", user.username, user.id);
                Ok(user)
            }
            Err(err) if is_unique_violation(&err) => {
                Err(UserError::UsernameTaken(username.to_string()))
            }
            Err(err) => Err(UserError::Sqlx(err)),
        }
    }

    pub async fn find_by_username(&self, username: &str) -> UserResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&*self.db)
        .await?;
        Ok(user)
    }

    /// Return the user only if `password` matches. Unknown usernames and
    /// wrong passwords are indistinguishable to the caller.
    pub async fn authenticate(&self, username: &str, password: &str) -> UserResult<Option<User>> {
        let user = self.find_by_username(username).await?;
        let digest = user.as_ref().map(|u| u.password_hash.clone());
        let password = password.to_string();

        let matches = tokio::task::spawn_blocking(move || match digest {
            Some(digest) => credentials::verify(&digest, &password),
            None => {
                credentials::verify(unknown_user_digest(), &password);
                false
            }
        })
        .await?;

        Ok(user.filter(|_| matches))
    }
}

fn unknown_user_digest() -> &'static str {
    UNKNOWN_USER_DIGEST.get_or_init(|| {
        credentials::hash("harmony-unknown-user").unwrap_or_else(|err| {
            warn!("could not prepare unknown-user digest: {}", err);
            String::new()
        })
    })
}

/// Return true if SQLx error indicates a unique constraint violation.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err) if db_err.message().to_ascii_lowercase().contains("unique")
    )
}

// argon2 is deliberately slow; keep it off the async workers.
async fn hash_blocking(password: String) -> Result<String, HashError> {
    match tokio::task::spawn_blocking(move || credentials::hash(&password)).await {
        Ok(result) => result,
        Err(join_err) => Err(HashError(join_err.to_string())),
    }
}
