//! # CLI Module
//!
//! Command handlers of the `sporlsync` binary. Each handler runs one unit of
//! work against a [`Context`] built once per process, reports progress with
//! a spinner and prints a short summary. Errors are returned to `main`,
//! which prints them and exits with status 1.
//!
//! ## Commands
//!
//! - [`auth`] - authorize a Spotify user and store its refresh token
//! - [`sync_followed`] - reconcile every user's followings
//! - [`followed_albums`] - check followed artists due for a check
//! - [`releases`] - sweep the new release search per market and tag
//! - [`refresh_albums`] - re-fetch every stored album
//! - [`missing_genres`] - refresh artists without genres
//! - [`cleanup`] - prune unfollowed and excluded artists
//! - [`info`] - catalog counts and cooldown status
//!
//! The scheduler that runs these periodically lives outside this crate.
//! Several commands may run at the same time in separate processes; they
//! share the request budget through the database.

mod artists;
mod auth;
mod context;
mod info;
mod releases;

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

pub use artists::{cleanup, followed_albums, missing_genres, sync_followed};
pub use auth::auth;
pub use context::Context;
pub use info::info;
pub use releases::{refresh_albums, releases};

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    if let Ok(style) = ProgressStyle::with_template("{spinner:.blue} {msg}") {
        pb.set_style(style.tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    }
    pb
}
