//! # Catalog Synchronization
//!
//! Bulk jobs that keep the local catalog in line with Spotify:
//!
//! - [`CatalogSync::sync_followed_artists`] reconciles a user's followings
//!   with the live follow list.
//! - [`CatalogSync::add_new_releases`] sweeps the tag search for new
//!   releases in one market.
//! - [`CatalogSync::add_followed_artist_albums`] checks the latest album and
//!   single of followed artists that are due for a check.
//! - [`CatalogSync::refresh_artists`] and [`CatalogSync::refresh_albums`]
//!   re-fetch one batch of artists or albums.
//!
//! Every job is sequential and writes through to the catalog as it goes, so
//! an aborted run leaves its progress in place and the next run completes
//! it. Failures of a single album or artist are logged with the job name and
//! the Spotify id and the loop moves on; unit-fatal errors (see
//! [`crate::Error::is_unit_fatal`]) abort the job.
//!
//! Discovered ids are collected in an [`IdBuffer`] and flushed through the
//! batched lookup endpoints as soon as the buffer reaches the configured
//! limit, with a final flush for the partial batch at the end of the input.

mod batch;
mod discovery;
mod filter;
mod followings;
mod refresh;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::{
    config::Settings,
    error::Result,
    genre::GenreCategorizer,
    management::{Catalog, TokenStore},
    spotify::SpotifyApi,
    types::{CleanupReport, SimpleAlbum},
};

pub use batch::IdBuffer;
pub use discovery::{MARKET_LOCK_PREFIX, MARKETS_CACHE_KEY};
pub use filter::{AlbumFilter, Rejection};

pub struct CatalogSync {
    api: SpotifyApi,
    tokens: Arc<TokenStore>,
    catalog: Arc<dyn Catalog>,
    categorizer: Arc<dyn GenreCategorizer>,
    settings: Settings,
    filter: AlbumFilter,
}

impl CatalogSync {
    pub fn new(
        api: SpotifyApi,
        tokens: Arc<TokenStore>,
        catalog: Arc<dyn Catalog>,
        categorizer: Arc<dyn GenreCategorizer>,
        settings: Settings,
    ) -> Self {
        let filter = AlbumFilter::new(&settings);
        Self {
            api,
            tokens,
            catalog,
            categorizer,
            settings,
            filter,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    /// Whether `album` belongs in the catalog.
    ///
    /// Accepts albums and singles released on a known day after the recency
    /// threshold, whose lower-cased name contains none of the name
    /// exceptions, whose primary artist is not excluded, and which are not
    /// stored yet. Every sync path admits albums through this check.
    pub async fn is_album_ok(&self, album: &SimpleAlbum) -> Result<bool> {
        Ok(self.album_rejection(album).await?.is_none())
    }

    pub async fn album_rejection(&self, album: &SimpleAlbum) -> Result<Option<Rejection>> {
        let mut rejection = self.filter.rejection(album, self.now());
        if rejection.is_none() && self.catalog.album_exists(&album.id).await? {
            rejection = Some(Rejection::AlreadyStored);
        }
        if let Some(reason) = rejection {
            debug!(album_spotify_id = %album.id, ?reason, "album rejected");
        }
        Ok(rejection)
    }

    /// False while an upstream cooldown is running. Bulk jobs are skipped
    /// until it ends.
    pub async fn are_requests_available(&self) -> Result<bool> {
        self.api.client().are_requests_available().await
    }

    /// Removes artists nobody follows that have nothing left in the catalog,
    /// plus everything belonging to excluded artists.
    pub async fn clear_artists(&self) -> Result<CleanupReport> {
        let report = self
            .catalog
            .clear_artists(&self.settings.artist_id_exceptions)
            .await?;
        info!(
            method = "clear_artists",
            without_albums = report.without_albums,
            exception_albums = report.exception_albums,
            exceptions = report.exceptions,
            without_genres_albums = report.without_genres_albums,
            without_genres = report.without_genres,
            "catalog cleaned"
        );
        Ok(report)
    }

    fn now(&self) -> DateTime<Utc> {
        self.api.client().clock().now()
    }
}
