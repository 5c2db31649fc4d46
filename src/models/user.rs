//! Registered accounts and the authenticated identity derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered account.
#[derive(Clone, FromRow, Debug)]
pub struct User {
    pub id: i64,
    pub username: String,
    /// PHC-formatted password digest (salt embedded).
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// The authenticated caller, as carried inside a session token.
///
/// Never persisted server-side.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub user_id: i64,
    pub username: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Body accepted by register and login.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Public view of the current identity.
#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct IdentityView {
    pub user_id: i64,
    pub username: String,
}

impl From<&Identity> for IdentityView {
    fn from(identity: &Identity) -> Self {
        Self {
            user_id: identity.user_id,
            username: identity.username.clone(),
        }
    }
}
