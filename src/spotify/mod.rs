//! # Spotify Integration Module
//!
//! Typed access to the Spotify Web API and the accounts service, layered on
//! top of one rate-limited HTTP client that every sync job shares.
//!
//! ```text
//! CatalogSync / CLI
//!          ↓
//! SpotifyApi (typed endpoints)      TokenStore (grants)
//!          ↓                              ↓
//! RateLimitedClient (shared budget, 429 backoff, 3 attempts)
//!          ↓
//! Transport (reqwest)
//! ```
//!
//! ## Modules
//!
//! - [`client`] - [`RateLimitedClient`] and the [`Transport`] seam. Every
//!   outbound call, token grants included, claims a slot of the shared
//!   request budget before it is sent.
//! - [`artists`] - followed artists (cursor pagination), artist lookups and
//!   artist album listings.
//! - [`releases`] - tag search for new releases (offset pagination capped at
//!   1000 results) and album lookups.
//! - [`profile`] - current user profile and the market list.
//! - [`auth`] - interactive authorization-code flow with PKCE, used once per
//!   user to obtain the refresh token stored on the user record.
//!
//! ## Errors
//!
//! Every call returns [`crate::Result`]. A 429 with a short `Retry-After` is
//! waited out transparently; a long one records a cooldown in the shared
//! cache that [`RateLimitedClient::are_requests_available`] reports until it
//! ends.

mod api;
pub mod artists;
pub mod auth;
pub mod client;
pub mod profile;
pub mod releases;

pub use api::{PAGE_LIMIT, SpotifyApi};
pub use client::{
    ApiRequest, ApiResponse, COOLDOWN_KEY, MAX_ATTEMPTS, MAX_RETRY_AFTER, REQUEST_BUDGET_KEY,
    RateLimitedClient, RequestLimits, ReqwestTransport, Transport,
};
pub use releases::SEARCH_MAX_OFFSET;
