use chrono::Duration;
use tracing::{debug, error, info, warn};

use crate::{
    error::{Error, Result},
    spotify::{PAGE_LIMIT, SEARCH_MAX_OFFSET},
    sync::{CatalogSync, IdBuffer},
    types::{DiscoveryReport, FullAlbum, NewAlbum, SimpleAlbum},
    utils,
};

pub const MARKETS_CACHE_KEY: &str = "current_markets";
pub const MARKET_LOCK_PREFIX: &str = "new-releases-swept::market=";

impl CatalogSync {
    /// Sweeps the tag search for `tag` in `market` and stores every album
    /// that passes [`CatalogSync::is_album_ok`].
    ///
    /// The search is paged from offset 0 to 950 in steps of 50 and stops
    /// early on an empty or final page. The primary artist of an accepted
    /// album is stored right away; album ids are flushed through the several
    /// albums lookup whenever the buffer reaches the batch limit, and the
    /// artists are refreshed the same way.
    pub async fn add_new_releases(&self, tag: &str, market: &str) -> Result<DiscoveryReport> {
        let token = self.tokens.get_client_access_token().await?;
        let mut albums = IdBuffer::new(self.settings.several_albums_limit);
        let mut artists = IdBuffer::new(self.settings.several_artists_limit);
        let mut report = DiscoveryReport::default();

        let mut offset = 0;
        while offset <= SEARCH_MAX_OFFSET {
            let page = self
                .api
                .search_new_releases(&token, tag, market, offset)
                .await?;
            offset += PAGE_LIMIT;

            let last_page = page.next.is_none();
            if page.items.is_empty() {
                break;
            }

            for album in page.items.into_iter().flatten() {
                report.scanned += 1;
                match self.collect_release(&album, &mut albums, &mut artists).await {
                    Ok(true) => report.accepted += 1,
                    Ok(false) => {}
                    Err(e) if e.is_unit_fatal() => return Err(e),
                    Err(e) => error!(
                        method = "add_new_releases",
                        album_spotify_id = %album.id,
                        error = %e,
                        "failed to collect album"
                    ),
                }

                if albums.is_full() {
                    self.flush_albums(&mut albums, &mut report).await?;
                }
                if artists.is_full() {
                    self.flush_artists(&mut artists).await?;
                }
            }

            if last_page {
                break;
            }
        }

        self.flush_albums(&mut albums, &mut report).await?;
        self.flush_artists(&mut artists).await?;

        info!(
            method = "add_new_releases",
            tag,
            market,
            scanned = report.scanned,
            accepted = report.accepted,
            saved = report.saved,
            "new releases added"
        );
        Ok(report)
    }

    /// Runs [`CatalogSync::add_new_releases`] for every search tag in every
    /// configured market that Spotify currently serves.
    ///
    /// Nothing is done while a cooldown is running. A market swept by another
    /// run within `cache_lock_ttl` is skipped. A failed market is logged and
    /// skipped; a rate limit cooldown ends the sweep.
    pub async fn add_new_releases_for_markets(&self, tags: &[String]) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport::default();
        if !self.are_requests_available().await? {
            warn!(
                method = "add_new_releases_for_markets",
                "requests are cooling down, skipping"
            );
            return Ok(report);
        }

        let current = self.current_markets().await;
        let markets = self
            .settings
            .markets
            .iter()
            .filter(|m| current.contains(*m));

        for market in markets {
            if !self.claim_market(market).await? {
                debug!(market = %market, "market swept recently, skipping");
                continue;
            }
            for tag in tags {
                match self.add_new_releases(tag, market).await {
                    Ok(r) => report.merge(r),
                    Err(e @ Error::RateLimitExceeded { .. }) => return Err(e),
                    Err(e) => error!(
                        method = "add_new_releases_for_markets",
                        market = %market,
                        tag = %tag,
                        error = %e,
                        "market sweep failed"
                    ),
                }
            }
        }

        Ok(report)
    }

    /// Marks `market` as swept for `cache_lock_ttl` seconds. Returns false
    /// when another run already holds the mark.
    async fn claim_market(&self, market: &str) -> Result<bool> {
        let cache = self.api.client().cache();
        let now = self.now();
        let key = format!("{MARKET_LOCK_PREFIX}{market}");
        let expires_at = now + Duration::seconds(self.settings.cache_lock_ttl as i64);
        cache.add(&key, "1", Some(expires_at), now).await
    }

    /// Checks the latest album and the latest single of followed artists
    /// that were not checked within `check_age` hours.
    ///
    /// Artists with an accepted release get their genres refreshed; every
    /// checked artist has its `checked_at` moved to now.
    pub async fn add_followed_artist_albums(&self, limit: Option<i64>) -> Result<DiscoveryReport> {
        let now = self.now();
        let checked_before = now - Duration::hours(self.settings.check_age);
        let due = self
            .catalog
            .stale_followed_artists(checked_before, limit.unwrap_or(-1))
            .await?;

        let mut albums = IdBuffer::new(self.settings.several_albums_limit);
        let mut artists = IdBuffer::new(self.settings.several_artists_limit);
        let mut report = DiscoveryReport::default();

        for artist in due {
            let token = self.tokens.get_client_access_token().await?;
            let mut has_new_release = false;

            let latest = [
                self.api.last_artist_album(&token, &artist.spotify_id).await,
                self.api.last_artist_single(&token, &artist.spotify_id).await,
            ];
            for release in latest {
                let accepted = match release {
                    Ok(Some(album)) => {
                        report.scanned += 1;
                        self.is_album_ok(&album).await.map(|ok| ok.then_some(album))
                    }
                    Ok(None) => Ok(None),
                    Err(e) => Err(e),
                };

                match accepted {
                    Ok(Some(album)) => {
                        report.accepted += 1;
                        has_new_release = true;
                        if albums.push(&album.id) {
                            self.flush_albums(&mut albums, &mut report).await?;
                        }
                    }
                    Ok(None) => {}
                    Err(e) if e.is_unit_fatal() => return Err(e),
                    Err(e) => error!(
                        method = "add_followed_artist_albums",
                        artist_spotify_id = %artist.spotify_id,
                        error = %e,
                        "failed to check latest release"
                    ),
                }
            }

            if has_new_release && artists.push(&artist.spotify_id) {
                self.flush_artists(&mut artists).await?;
            }

            if let Err(e) = self.catalog.touch_artist(artist.id, now).await {
                error!(
                    method = "add_followed_artist_albums",
                    artist_spotify_id = %artist.spotify_id,
                    error = %e,
                    "failed to mark artist as checked"
                );
            }
        }

        self.flush_albums(&mut albums, &mut report).await?;
        self.flush_artists(&mut artists).await?;
        Ok(report)
    }

    /// Country codes Spotify currently serves, cached for `cache_ttl`.
    ///
    /// Returns an empty list when the lookup fails.
    pub async fn current_markets(&self) -> Vec<String> {
        match self.fetch_current_markets().await {
            Ok(markets) => markets,
            Err(e) => {
                error!(method = "current_markets", error = %e, "failed to load markets");
                Vec::new()
            }
        }
    }

    async fn fetch_current_markets(&self) -> Result<Vec<String>> {
        let cache = self.api.client().cache();
        let now = self.now();
        if let Some(cached) = cache.get(MARKETS_CACHE_KEY, now).await? {
            if let Ok(markets) = serde_json::from_str::<Vec<String>>(&cached) {
                return Ok(markets);
            }
        }

        let token = self.tokens.get_client_access_token().await?;
        let markets = self.api.markets(&token).await?;
        let expires_at = now + Duration::seconds(self.settings.cache_ttl as i64);
        cache
            .put(
                MARKETS_CACHE_KEY,
                &serde_json::to_string(&markets)?,
                Some(expires_at),
            )
            .await?;
        Ok(markets)
    }

    /// Fetches full albums for `album_spotify_ids` in one lookup and stores
    /// them along with their primary artists. Returns how many were stored.
    pub async fn save_albums(&self, album_spotify_ids: &[String]) -> Result<usize> {
        let ids = utils::dedup_preserving_order(album_spotify_ids);
        if ids.len() > self.settings.several_albums_limit {
            return Err(Error::BatchTooLarge {
                kind: "album",
                len: ids.len(),
                limit: self.settings.several_albums_limit,
            });
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let token = self.tokens.get_client_access_token().await?;
        let albums = self.api.several_albums(&token, &ids).await?;

        let mut saved = 0;
        for album in albums.into_iter().flatten() {
            match self.save_album(&album).await {
                Ok(true) => saved += 1,
                Ok(false) => {}
                Err(e) => error!(
                    method = "save_albums",
                    album_spotify_id = %album.id,
                    name = %album.name,
                    error = %e,
                    "failed to save album"
                ),
            }
        }
        Ok(saved)
    }

    async fn save_album(&self, album: &FullAlbum) -> Result<bool> {
        let Some(primary) = album.artists.first() else {
            warn!(album_spotify_id = %album.id, "album without artists, skipping");
            return Ok(false);
        };
        let Some(release_date) =
            utils::parse_release_date(&album.release_date, album.release_date_precision)
        else {
            warn!(
                album_spotify_id = %album.id,
                release_date = %album.release_date,
                "unreadable release date, skipping"
            );
            return Ok(false);
        };

        let artist = self
            .catalog
            .artist_first_or_create(&primary.id, &primary.name)
            .await?;
        self.catalog
            .album_first_or_create(&NewAlbum {
                spotify_id: album.id.clone(),
                name: album.name.clone(),
                release_date,
                artist_id: artist.id,
                available_markets: album.available_markets.clone(),
                image_url: album.cover_url().map(str::to_string),
                popularity: album.popularity,
                album_type: album.album_type,
            })
            .await?;
        Ok(true)
    }

    /// Gates a search result and buffers it when accepted.
    async fn collect_release(
        &self,
        album: &SimpleAlbum,
        albums: &mut IdBuffer,
        artists: &mut IdBuffer,
    ) -> Result<bool> {
        if !self.is_album_ok(album).await? {
            return Ok(false);
        }
        let Some(primary) = album.primary_artist() else {
            return Ok(false);
        };

        self.catalog
            .artist_first_or_create(&primary.id, &primary.name)
            .await?;
        albums.push(&album.id);
        artists.push(&primary.id);
        Ok(true)
    }

    /// Saves the buffered albums. The buffer is emptied even when the lookup
    /// fails so one bad batch cannot block the ones after it.
    pub(super) async fn flush_albums(
        &self,
        albums: &mut IdBuffer,
        report: &mut DiscoveryReport,
    ) -> Result<()> {
        if albums.is_empty() {
            return Ok(());
        }
        let ids = albums.take();
        match self.save_albums(&ids).await {
            Ok(saved) => report.saved += saved,
            Err(e) if e.is_unit_fatal() => return Err(e),
            Err(e) => error!(
                method = "save_albums",
                batch = ids.len(),
                error = %e,
                "album batch failed"
            ),
        }
        Ok(())
    }

    pub(super) async fn flush_artists(&self, artists: &mut IdBuffer) -> Result<()> {
        if artists.is_empty() {
            return Ok(());
        }
        let ids = artists.take();
        match self.refresh_artists(&ids).await {
            Ok(_) => {}
            Err(e) if e.is_unit_fatal() => return Err(e),
            Err(e) => error!(
                method = "refresh_artists",
                batch = ids.len(),
                error = %e,
                "artist batch failed"
            ),
        }
        Ok(())
    }
}
