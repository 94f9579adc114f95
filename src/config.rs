//! Configuration management for the release synchronizer.
//!
//! Two layers feed the application:
//! 1. Credentials and endpoints come from environment variables, optionally
//!    loaded from a `.env` file in the local data directory.
//! 2. Tuning values (batch limits, request budget, denylists, markets, genre
//!    keyword table) come from `config.toml` in the same directory. Every
//!    value has a default, so the file is optional. Numeric values can be
//!    overridden with `SPORLSYNC_*` environment variables.
//!
//! The data directory is platform specific:
//! - Linux: `~/.local/share/sporlsync/`
//! - macOS: `~/Library/Application Support/sporlsync/`
//! - Windows: `%LOCALAPPDATA%/sporlsync/`

use std::{env, path::PathBuf, str::FromStr};

use serde::Deserialize;

use crate::error::{Error, Result};

const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_AUTH_URL: &str = "https://accounts.spotify.com/authorize";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const DEFAULT_SCOPE: &str = "user-read-email user-read-private user-follow-read user-library-read";

/// Returns the application's local data directory, `<data dir>/sporlsync`.
pub fn data_dir() -> PathBuf {
    let mut path = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("sporlsync");
    path
}

/// Loads environment variables from the `.env` file in the local data directory.
///
/// Creates the data directory if it does not exist yet. A missing `.env` file
/// is not an error: variables may come from the process environment instead.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or if an existing
/// `.env` file cannot be parsed.
pub async fn load_env() -> Result<()> {
    let dir = data_dir();
    async_fs::create_dir_all(&dir)
        .await
        .map_err(|e| Error::Config(e.to_string()))?;

    let path = dir.join(".env");
    if path.is_file() {
        dotenv::from_path(&path).map_err(|e| Error::Config(e.to_string()))?;
    }
    Ok(())
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("{name} must be set")))
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Returns the address the local OAuth callback server binds to.
pub fn server_addr() -> Result<String> {
    required("SERVER_ADDRESS")
}

/// Returns the database URL shared by every unit of work.
///
/// Defaults to `sqlite://<data dir>/sporlsync.db`. Units running as separate
/// processes must point at the same database so they share one request
/// budget and one cooldown marker.
pub fn database_url() -> String {
    env::var("SPORLSYNC_DATABASE_URL").unwrap_or_else(|_| {
        format!(
            "sqlite://{}?mode=rwc",
            data_dir().join("sporlsync.db").display()
        )
    })
}

/// Client credentials and Web API endpoints.
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scope: String,
    pub api_url: String,
    pub auth_url: String,
    pub token_url: String,
}

impl SpotifyCredentials {
    /// Reads credentials from the environment.
    ///
    /// # Errors
    ///
    /// Fails when `SPOTIFY_API_AUTH_CLIENT_ID` or
    /// `SPOTIFY_API_AUTH_CLIENT_SECRET` is missing. The redirect URI is only
    /// required by the `auth` command and defaults to an empty string.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: required("SPOTIFY_API_AUTH_CLIENT_ID")?,
            client_secret: required("SPOTIFY_API_AUTH_CLIENT_SECRET")?,
            redirect_uri: optional("SPOTIFY_API_REDIRECT_URI", ""),
            scope: optional("SPOTIFY_API_AUTH_SCOPE", DEFAULT_SCOPE),
            api_url: optional("SPOTIFY_API_URL", DEFAULT_API_URL),
            auth_url: optional("SPOTIFY_API_AUTH_URL", DEFAULT_AUTH_URL),
            token_url: optional("SPOTIFY_API_TOKEN_URL", DEFAULT_TOKEN_URL),
        })
    }
}

/// One row of the genre keyword table.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GenreCategory {
    pub name: String,
    pub keywords: Vec<String>,
}

/// Tuning values consumed by the client, the token store and the sync jobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Releases older than this many days are ignored.
    pub release_age: i64,
    /// Followed artists are re-checked for new albums after this many hours.
    pub check_age: i64,
    pub several_albums_limit: usize,
    pub several_artists_limit: usize,
    /// Requests allowed per rate limit window.
    pub request_rate_limit_attempts: u32,
    /// Rate limit window length in seconds.
    pub request_rate_limit_decay: u64,
    pub cache_ttl: u64,
    pub cache_lock_ttl: u64,
    pub exceptions: Vec<String>,
    pub artist_id_exceptions: Vec<String>,
    pub banned_genre_names: Vec<String>,
    pub markets: Vec<String>,
    pub search_tags: Vec<String>,
    pub genre_categories: Vec<GenreCategory>,
    pub log_level: String,
    pub log_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            release_age: 14,
            check_age: 6,
            several_albums_limit: 20,
            several_artists_limit: 50,
            request_rate_limit_attempts: 100,
            request_rate_limit_decay: 30,
            cache_ttl: 60 * 60,
            cache_lock_ttl: 10 * 60,
            exceptions: strings(&[
                "live",
                "remix",
                "anniversary",
                "deluxe",
                "expanded",
                "instrumentals",
                "best",
                "soundtrack",
                "demos",
                "edition",
                "remastered",
            ]),
            artist_id_exceptions: strings(&[
                "5aIqB5nVVvmFsvSdExz408", // Johann Sebastian Bach
                "4NJhFmfw43RLBLjQvxDuRS", // Wolfgang Amadeus Mozart
                "7y97mc3bZRFXzT2szRM4L4", // Frédéric Chopin
                "2wOqMjp9TyABvtHdOSOTUS", // Ludwig van Beethoven
                "1Uff91EOsvd99rtAupatMP", // Claude Debussy
                "3MKCzCnpzw3TjUYs2v7vDA", // Pyotr Ilyich Tchaikovsky
                "0Kekt6CKSo0m5mivKcoH51", // Sergei Rachmaninoff
                "2QOIawHpSlOwXDvSqQ9YJR", // Antonio Vivaldi
                "1RdlqiArFMbLBLQTPg3EGW", // Java Jazz Cafe
                "099Fz1rpYJ7sZxdyXzIf6s", // Java Jazz Cafe
                "2p0UyoPfYfI76PCStuXfOP", // Franz Schubert
                "5wTAi7QkpP6kp8a54lmTOq", // Johannes Brahms
                "2hHUcumhJFUHQKg5h3jI1Y", // Jazz Lounge Bar
                "3jmd2RL8vGnluearHualn2", // Coffee Shop Jazz Piano Chilling
                "21p1cEg5BT8TCSYIlV3k7M", // Easy Listening Background Music
            ]),
            banned_genre_names: Vec::new(),
            markets: strings(&[
                "AL", "AM", "AR", "AT", "AU", "AZ", "BA", "BE", "BG", "BR", "BY", "CA", "CH",
                "CL", "CY", "CZ", "DE", "DK", "EE", "EG", "ES", "FI", "FR", "GB", "GE", "GR",
                "HK", "HU", "IE", "IL", "IN", "IS", "IT", "JM", "JP", "KZ", "KR", "KG", "LI",
                "LV", "LT", "LU", "MT", "MX", "MD", "MC", "MN", "NO", "NP", "NL", "NZ", "PK",
                "PE", "PL", "PT", "RU", "RO", "RS", "SE", "SG", "SK", "SI", "TJ", "TR", "UA",
                "US", "UZ", "VN", "ZA",
            ]),
            search_tags: strings(&["new", "hipster"]),
            genre_categories: default_genre_categories(),
            log_level: "info".into(),
            log_format: "pretty".into(),
        }
    }
}

impl Settings {
    /// Loads `config.toml` from the data directory, falling back to defaults
    /// when the file does not exist, then applies environment overrides.
    pub async fn load() -> Result<Self> {
        let path = data_dir().join("config.toml");
        let settings = if path.is_file() {
            let content = async_fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Config(e.to_string()))?;
            Self::from_toml(&content)?
        } else {
            Self::default()
        };

        let settings = settings.with_env_overrides()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    fn with_env_overrides(mut self) -> Result<Self> {
        override_from_env("SPORLSYNC_RELEASE_AGE", &mut self.release_age)?;
        override_from_env("SPORLSYNC_CHECK_AGE", &mut self.check_age)?;
        override_from_env(
            "SPORLSYNC_SEVERAL_ALBUMS_LIMIT",
            &mut self.several_albums_limit,
        )?;
        override_from_env(
            "SPORLSYNC_SEVERAL_ARTISTS_LIMIT",
            &mut self.several_artists_limit,
        )?;
        override_from_env(
            "SPORLSYNC_REQUEST_RATE_LIMIT_ATTEMPTS",
            &mut self.request_rate_limit_attempts,
        )?;
        override_from_env(
            "SPORLSYNC_REQUEST_RATE_LIMIT_DECAY",
            &mut self.request_rate_limit_decay,
        )?;
        override_from_env("SPORLSYNC_CACHE_TTL", &mut self.cache_ttl)?;
        override_from_env("SPORLSYNC_CACHE_LOCK_TTL", &mut self.cache_lock_ttl)?;
        Ok(self)
    }

    /// Rejects values that would stall or break the batching policy.
    pub fn validate(&self) -> Result<()> {
        if self.several_albums_limit == 0 {
            return Err(Error::Config("several_albums_limit must be > 0".into()));
        }
        if self.several_artists_limit == 0 {
            return Err(Error::Config("several_artists_limit must be > 0".into()));
        }
        if self.request_rate_limit_attempts == 0 {
            return Err(Error::Config(
                "request_rate_limit_attempts must be > 0".into(),
            ));
        }
        if self.request_rate_limit_decay == 0 {
            return Err(Error::Config("request_rate_limit_decay must be > 0".into()));
        }
        if self.release_age < 0 {
            return Err(Error::Config("release_age must not be negative".into()));
        }
        Ok(())
    }
}

fn override_from_env<T: FromStr>(name: &str, target: &mut T) -> Result<()> {
    if let Ok(raw) = env::var(name) {
        *target = raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{name} has an invalid value: {raw}")))?;
    }
    Ok(())
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn category(name: &str, keywords: &[&str]) -> GenreCategory {
    GenreCategory {
        name: name.to_string(),
        keywords: strings(keywords),
    }
}

fn default_genre_categories() -> Vec<GenreCategory> {
    vec![
        category(
            "rock",
            &[
                "rock", "grunge", "britpop", "surf", "new wave", "visual kei", "shoegaze",
                "merseybeat", "dreamo", "beatlesque", "oshare kei",
            ],
        ),
        category("metal", &["metal", "thrash", "djent", "doom", "sludge"]),
        category("hip hop", &["hip hop", "rap", "boom bap"]),
        category(
            "punk",
            &[
                "punk", "hardcore", "emo", "crust", "screamo", "nyhc", "easycore", "orgcore",
            ],
        ),
        category("pop", &["pop", "otacore"]),
        category("jazz", &["jazz", "bop"]),
        category("blues", &["blues"]),
        category("funk", &["funk", "motown"]),
        category("soul/r&b", &["soul", "r&b"]),
        category(
            "classical",
            &[
                "classical",
                "baroque",
                "romantic",
                "early",
                "choral",
                "tenor",
                "post-minimalism",
                "impressionism",
                "operetta",
            ],
        ),
        category(
            "folk/country",
            &[
                "folk",
                "country",
                "bluegrass",
                "americana",
                "afrobeat",
                "indigenous",
                "tierra caliente",
                "mexicano",
            ],
        ),
        category("reggae/ska", &["reggae", "ska"]),
        category(
            "electronic",
            &[
                "electro",
                "rave",
                "downtempo",
                "trip hop",
                "breakbeat",
                "big beat",
                "trance",
                "dance",
                "ambient",
                "drill",
                "house",
                "edm",
                "chill",
                "garage",
                "beats",
                "disco",
                "dubstep",
                "indietronica",
                "synthwave",
                "breakcore",
                "nintendocore",
                "techno",
                "drum and bass",
                "phonk",
                "hardstyle",
            ],
        ),
        category("latin", &["latin"]),
        category("other", &["other"]),
    ]
}
