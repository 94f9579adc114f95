use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenScope {
    User,
    Client,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub value: String,
    pub expires_at: DateTime<Utc>,
    pub scope: TokenScope,
    /// Set when the token endpoint rotated the user's refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Token {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Body of every grant answered by the accounts token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// Authorization attempt shared between the `auth` command and the
/// callback handler.
#[derive(Debug, Clone)]
pub struct PkceState {
    pub code_verifier: String,
    /// Must come back unchanged in the callback query.
    pub state: String,
    /// Set by the callback once the user has been stored.
    pub user: Option<User>,
    pub failure: Option<String>,
}

// ---------------------------------------------------------------------------
// Web API payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbumType {
    Album,
    Single,
    Compilation,
    #[serde(other)]
    Other,
}

impl AlbumType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumType::Album => "album",
            AlbumType::Single => "single",
            AlbumType::Compilation => "compilation",
            AlbumType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "album" => AlbumType::Album,
            "single" => AlbumType::Single,
            "compilation" => AlbumType::Compilation,
            _ => AlbumType::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatePrecision {
    Year,
    Month,
    Day,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleArtist {
    pub id: String,
    pub name: String,
}

/// Album as returned by search and artist-album listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleAlbum {
    pub id: String,
    pub name: String,
    pub album_type: AlbumType,
    pub release_date: String,
    pub release_date_precision: DatePrecision,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
}

impl SimpleAlbum {
    pub fn primary_artist(&self) -> Option<&SimpleArtist> {
        self.artists.first()
    }
}

/// Album as returned by the album lookup endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullAlbum {
    pub id: String,
    pub name: String,
    pub album_type: AlbumType,
    pub release_date: String,
    pub release_date_precision: DatePrecision,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    #[serde(default)]
    pub available_markets: Vec<String>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub popularity: i64,
}

impl FullAlbum {
    /// The medium (300px) cover, falling back to the first image.
    pub fn cover_url(&self) -> Option<&str> {
        self.images
            .get(1)
            .or_else(|| self.images.first())
            .map(|i| i.url.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowedArtistsResponse {
    pub artists: FollowedArtistsPage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FollowedArtistsPage {
    pub items: Vec<FullArtist>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub cursors: Option<Cursors>,
    #[serde(default)]
    pub total: Option<u64>,
}

impl FollowedArtistsPage {
    /// Cursor for the next page; `None` once the list is exhausted.
    pub fn after(&self) -> Option<&str> {
        self.cursors
            .as_ref()
            .and_then(|c| c.after.as_deref())
            .filter(|a| !a.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cursors {
    #[serde(default)]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlbumPage {
    #[serde(default)]
    pub items: Vec<Option<SimpleAlbum>>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub total: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchAlbumsResponse {
    pub albums: AlbumPage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeveralAlbumsResponse {
    pub albums: Vec<Option<FullAlbum>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeveralArtistsResponse {
    pub artists: Vec<Option<FullArtist>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketsResponse {
    pub markets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

// ---------------------------------------------------------------------------
// Catalog records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub spotify_id: String,
    pub name: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArtistRecord {
    pub id: i64,
    pub spotify_id: String,
    pub name: String,
    pub checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlbumRecord {
    pub id: i64,
    pub spotify_id: String,
    pub name: String,
    pub release_date: NaiveDate,
    pub artist_id: i64,
    pub available_markets: Vec<String>,
    pub image_url: Option<String>,
    pub popularity: i64,
    pub album_type: AlbumType,
}

/// Fields of an album row that are written on insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAlbum {
    pub spotify_id: String,
    pub name: String,
    pub release_date: NaiveDate,
    pub artist_id: i64,
    pub available_markets: Vec<String>,
    pub image_url: Option<String>,
    pub popularity: i64,
    pub album_type: AlbumType,
}

/// Fields of an album row that changed upstream. `None` means unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlbumChanges {
    pub popularity: Option<i64>,
    pub available_markets: Option<Vec<String>>,
    pub image_url: Option<Option<String>>,
}

impl AlbumChanges {
    pub fn is_empty(&self) -> bool {
        self.popularity.is_none() && self.available_markets.is_none() && self.image_url.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenreRecord {
    pub id: i64,
    pub name: String,
    pub category_id: Option<i64>,
}

/// Result of reconciling an association set against a target set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncChanges {
    pub attached: usize,
    pub detached: usize,
}

impl SyncChanges {
    pub fn is_empty(&self) -> bool {
        self.attached == 0 && self.detached == 0
    }
}

/// Outcome of one discovery sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Albums looked at.
    pub scanned: usize,
    /// Albums that passed the acceptance predicate.
    pub accepted: usize,
    /// Albums written by the batched lookups.
    pub saved: usize,
}

impl DiscoveryReport {
    pub fn merge(&mut self, other: DiscoveryReport) {
        self.scanned += other.scanned;
        self.accepted += other.accepted;
        self.saved += other.saved;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlbumRefreshReport {
    pub updated: usize,
    pub unchanged: usize,
    pub deleted: usize,
    /// Stored albums the batched lookup no longer returned.
    pub missing: usize,
}

impl AlbumRefreshReport {
    pub fn merge(&mut self, other: AlbumRefreshReport) {
        self.updated += other.updated;
        self.unchanged += other.unchanged;
        self.deleted += other.deleted;
        self.missing += other.missing;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowSyncReport {
    /// Artists collected from the follow list, exclusions left out.
    pub followed: usize,
    pub followings: SyncChanges,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub without_albums: u64,
    pub exception_albums: u64,
    pub exceptions: u64,
    pub without_genres_albums: u64,
    pub without_genres: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    pub users: i64,
    pub artists: i64,
    pub albums: i64,
    pub genres: i64,
    pub followings: i64,
}

#[derive(Tabled)]
pub struct CountTableRow {
    pub entity: String,
    pub rows: i64,
}
