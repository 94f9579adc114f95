//! # API Module
//!
//! HTTP endpoints served by the local server while the `auth` command runs.
//!
//! - `GET /callback` - completes the authorization-code grant with PKCE:
//!   checks the `state` parameter, exchanges the code through
//!   [`crate::management::TokenStore::exchange_code`], looks up the profile
//!   and stores the user together with its refresh token.
//! - `GET /health` - liveness probe returning the package name and version.

mod callback;
mod health;

pub use callback::callback;
pub use health::health;
