//! Cookie-carried session authentication.
//!
//! Routes opt into one of two middlewares: [`require_auth`] rejects
//! requests without a valid session, [`optional_auth`] lets them through
//! anonymously. Handlers read the outcome with [`CurrentIdentity`] or by
//! extracting [`Identity`](crate::models::user::Identity) directly.

pub mod cookie;
pub mod middleware;
pub mod session;

pub use cookie::{SESSION_COOKIE, cleared_cookie, session_cookie};
pub use middleware::{optional_auth, require_auth};
pub use session::CurrentIdentity;
