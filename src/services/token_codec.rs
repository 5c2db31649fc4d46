//! Signed, time-bound session tokens.
//!
//! Tokens are HS256 JWTs. The algorithm is fixed on both sides: the header
//! of an incoming token is never trusted to pick the verification method.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::user::Identity;

/// Issuer claim stamped on and required from every token.
pub const TOKEN_ISSUER: &str = "harmony_web_player";

/// Lifetime of an issued token.
pub const TOKEN_TTL_HOURS: i64 = 24;

const PINNED_ALGORITHM: Algorithm = Algorithm::HS256;

/// Opaque validation failure. The concrete cause is only logged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Claims {
    user_id: i64,
    username: String,
    #[serde(rename = "iss")]
    issuer: String,
    #[serde(rename = "iat")]
    issued_at: i64,
    #[serde(rename = "exp")]
    expires_at: i64,
}

/// Issues and validates session tokens with a server-held symmetric key.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(PINNED_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[TOKEN_ISSUER]);
        validation.set_required_spec_claims(&["exp", "iat", "iss"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Issue a token for the given user, valid from now.
    pub fn issue(&self, user_id: i64, username: &str) -> Result<(String, Identity), TokenError> {
        self.issue_at(user_id, username, Utc::now())
    }

    /// Issue a token as if the current time were `issued_at`.
    pub fn issue_at(
        &self,
        user_id: i64,
        username: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<(String, Identity), TokenError> {
        // Claims carry whole seconds; truncate so the returned identity
        // matches what validation will decode.
        let issued_at = from_timestamp(issued_at.timestamp())?;
        let expires_at = issued_at + Duration::hours(TOKEN_TTL_HOURS);
        let claims = Claims {
            user_id,
            username: username.to_string(),
            issuer: TOKEN_ISSUER.to_string(),
            issued_at: issued_at.timestamp(),
            expires_at: expires_at.timestamp(),
        };

        let token = encode(&Header::new(PINNED_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|err| {
                tracing::error!("failed to sign session token: {}", err);
                TokenError::Invalid
            })?;

        Ok((
            token,
            Identity {
                user_id,
                username: claims.username,
                issued_at,
                expires_at,
            },
        ))
    }

    /// Verify signature, algorithm, issuer and expiry of `token`.
    pub fn validate(&self, token: &str) -> Result<Identity, TokenError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|err| {
            debug!("session token rejected: {}", err);
            TokenError::Invalid
        })?;

        // jsonwebtoken compares `exp < now`; a token expiring this very
        // second is treated as expired too.
        let claims = data.claims;
        if claims.expires_at <= Utc::now().timestamp() {
            debug!("session token rejected: expired");
            return Err(TokenError::Invalid);
        }

        Ok(Identity {
            user_id: claims.user_id,
            username: claims.username,
            issued_at: from_timestamp(claims.issued_at)?,
            expires_at: from_timestamp(claims.expires_at)?,
        })
    }
}

fn from_timestamp(secs: i64) -> Result<DateTime<Utc>, TokenError> {
    Utc.timestamp_opt(secs, 0).single().ok_or(TokenError::Invalid)
}
