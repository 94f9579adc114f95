//! Spotify Catalog Sync Library
//!
//! Keeps a local catalog of followed artists and fresh releases in sync with
//! the Spotify Web API. Every unit of work shares one request budget and one
//! cooldown marker through the shared cache, so independent jobs can run at
//! the same time without exceeding the upstream quota.
//!
//! # Modules
//!
//! - `api` - HTTP endpoints of the local OAuth callback server
//! - `cli` - command handlers of the `sporlsync` binary
//! - `clock` - wall clock and sleeps, replaceable in tests
//! - `config` - environment credentials and tunable settings
//! - `error` - error taxonomy shared by every layer
//! - `genre` - genre to category classification
//! - `logging` - `tracing` subscriber setup
//! - `management` - token store, shared cache and catalog persistence
//! - `server` - local HTTP server for OAuth callbacks
//! - `spotify` - rate-limited Web API client and typed endpoints
//! - `sync` - follow list, release discovery and refresh jobs
//! - `types` - payloads, records and reports
//! - `utils` - PKCE and date helpers
//!
//! # Example
//!
//! ```
//! use sporlsync::{cli, config};
//!
//! #[tokio::main]
//! async fn main() -> sporlsync::Result<()> {
//!     config::load_env().await?;
//!     let settings = config::Settings::load().await?;
//!     let context = cli::Context::init(settings).await?;
//!     cli::sync_followed(&context).await
//! }
//! ```

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod genre;
pub mod logging;
pub mod management;
pub mod server;
pub mod spotify;
pub mod sync;
pub mod types;
pub mod utils;

pub use error::{Error, Result};

/// Prints a status line prefixed with a blue `o`.
#[macro_export]
macro_rules! info {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "o".blue().bold(), std::format_args!($($arg)*));
  })
}

/// Prints a status line prefixed with a green check mark.
#[macro_export]
macro_rules! success {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "✓".green().bold(), std::format_args!($($arg)*));
  })
}

/// Prints the message to stderr prefixed with a red `!` and exits with
/// status 1.
///
/// Only the binary calls this; library code returns [`Error`] instead.
#[macro_export]
macro_rules! error {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    eprintln!("[{}] {}", "!".red().bold(), std::format_args!($($arg)*));
    std::process::exit(1);
  })
}

/// Prints a status line prefixed with a yellow `!`.
#[macro_export]
macro_rules! warning {
  ($($arg:tt)*) => ({
    use colored::Colorize;
    println!("[{}] {}", "!".yellow().bold(), std::format_args!($($arg)*));
  })
}
