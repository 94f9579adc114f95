use std::collections::{HashMap, HashSet};

use tracing::{error, info};

use crate::{
    error::{Error, Result},
    sync::CatalogSync,
    types::{AlbumChanges, AlbumRecord, AlbumRefreshReport, AlbumType, FullAlbum, FullArtist},
    utils,
};

enum AlbumOutcome {
    Updated,
    Unchanged,
    Deleted,
}

impl CatalogSync {
    /// Re-fetches up to `several_artists_limit` artists in one lookup and
    /// reconciles the genre set of each. Returns how many were reconciled.
    ///
    /// # Errors
    ///
    /// `BatchTooLarge` when more distinct ids are passed than one lookup
    /// may carry.
    pub async fn refresh_artists(&self, artist_spotify_ids: &[String]) -> Result<usize> {
        let ids = utils::dedup_preserving_order(artist_spotify_ids);
        if ids.len() > self.settings.several_artists_limit {
            return Err(Error::BatchTooLarge {
                kind: "artist",
                len: ids.len(),
                limit: self.settings.several_artists_limit,
            });
        }
        if ids.is_empty() {
            return Ok(0);
        }

        let token = self.tokens.get_client_access_token().await?;
        let artists = self.api.several_artists(&token, &ids).await?;

        let mut refreshed = 0;
        for artist in artists.into_iter().flatten() {
            match self.update_artist_genres(&artist).await {
                Ok(_) => refreshed += 1,
                Err(e) => error!(
                    method = "refresh_artists",
                    artist_spotify_id = %artist.id,
                    name = %artist.name,
                    error = %e,
                    "failed to update artist genres"
                ),
            }
        }
        Ok(refreshed)
    }

    /// Makes the stored genre set of `artist` match the payload and returns
    /// the artist's row id.
    ///
    /// Banned genre names are dropped. A genre seen for the first time is
    /// categorized once; genres that already carry a category are left alone.
    pub(super) async fn update_artist_genres(&self, artist: &FullArtist) -> Result<i64> {
        let mut genre_ids = Vec::with_capacity(artist.genres.len());
        for name in &artist.genres {
            if self.settings.banned_genre_names.contains(name) {
                continue;
            }

            let genre = self.catalog.genre_first_or_create(name).await?;
            if genre.category_id.is_none() {
                let category = self.categorizer.categorize(&genre.name);
                let category_id = self.catalog.category_first_or_create(&category).await?;
                self.catalog.set_genre_category(genre.id, category_id).await?;
            }
            genre_ids.push(genre.id);
        }

        let record = self
            .catalog
            .artist_first_or_create(&artist.id, &artist.name)
            .await?;
        let genre_ids = utils::dedup_preserving_order(&genre_ids);
        self.catalog.sync_artist_genres(record.id, &genre_ids).await?;
        Ok(record.id)
    }

    /// Re-fetches one batch of stored albums and writes back only the fields
    /// that changed. Albums that turned into compilations are deleted.
    ///
    /// `album_ids` are catalog row ids.
    pub async fn refresh_albums(&self, album_ids: &[i64]) -> Result<AlbumRefreshReport> {
        let ids = utils::dedup_preserving_order(album_ids);
        if ids.len() > self.settings.several_albums_limit {
            return Err(Error::BatchTooLarge {
                kind: "album",
                len: ids.len(),
                limit: self.settings.several_albums_limit,
            });
        }

        let mut report = AlbumRefreshReport::default();
        let stored = self.catalog.albums_by_ids(&ids).await?;
        if stored.is_empty() {
            return Ok(report);
        }

        let spotify_ids: Vec<String> = stored.iter().map(|a| a.spotify_id.clone()).collect();
        let token = self.tokens.get_client_access_token().await?;
        let fresh = self.api.several_albums(&token, &spotify_ids).await?;

        let by_spotify_id: HashMap<&str, &AlbumRecord> =
            stored.iter().map(|a| (a.spotify_id.as_str(), a)).collect();
        let mut seen = HashSet::new();

        for album in fresh.into_iter().flatten() {
            let Some(record) = by_spotify_id.get(album.id.as_str()) else {
                continue;
            };
            seen.insert(record.id);

            match self.apply_album_refresh(record, &album).await {
                Ok(AlbumOutcome::Updated) => report.updated += 1,
                Ok(AlbumOutcome::Unchanged) => report.unchanged += 1,
                Ok(AlbumOutcome::Deleted) => report.deleted += 1,
                Err(e) => error!(
                    method = "refresh_albums",
                    album_spotify_id = %album.id,
                    error = %e,
                    "failed to refresh album"
                ),
            }
        }

        report.missing = stored.len() - seen.len();
        Ok(report)
    }

    /// Walks every stored album in batches of `several_albums_limit`.
    /// A failed batch is logged and skipped.
    pub async fn refresh_catalog_albums(&self) -> Result<AlbumRefreshReport> {
        let limit = self.settings.several_albums_limit as i64;
        let mut report = AlbumRefreshReport::default();
        let mut after_id = 0;

        loop {
            let ids = self.catalog.album_ids_after(after_id, limit).await?;
            let Some(&last) = ids.last() else {
                break;
            };
            after_id = last;

            match self.refresh_albums(&ids).await {
                Ok(batch) => report.merge(batch),
                Err(e) if e.is_unit_fatal() => return Err(e),
                Err(e) => error!(
                    method = "refresh_catalog_albums",
                    after_id,
                    error = %e,
                    "album batch failed"
                ),
            }
        }

        info!(
            method = "refresh_catalog_albums",
            updated = report.updated,
            deleted = report.deleted,
            unchanged = report.unchanged,
            missing = report.missing,
            "albums refreshed"
        );
        Ok(report)
    }

    /// Refreshes every artist that has no genre connection, in batches of
    /// `several_artists_limit`.
    pub async fn refresh_artists_without_genres(&self) -> Result<usize> {
        let limit = self.settings.several_artists_limit as i64;
        let mut refreshed = 0;
        let mut after_id = 0;

        loop {
            let artists = self.catalog.artists_without_genres(after_id, limit).await?;
            let Some(last) = artists.last() else {
                break;
            };
            after_id = last.id;

            let ids: Vec<String> = artists.iter().map(|a| a.spotify_id.clone()).collect();
            match self.refresh_artists(&ids).await {
                Ok(n) => refreshed += n,
                Err(e) if e.is_unit_fatal() => return Err(e),
                Err(e) => error!(
                    method = "refresh_artists_without_genres",
                    after_id,
                    error = %e,
                    "artist batch failed"
                ),
            }
        }

        Ok(refreshed)
    }

    async fn apply_album_refresh(
        &self,
        record: &AlbumRecord,
        album: &FullAlbum,
    ) -> Result<AlbumOutcome> {
        if album.album_type == AlbumType::Compilation {
            self.catalog.delete_album(record.id).await?;
            return Ok(AlbumOutcome::Deleted);
        }

        let changes = album_changes(record, album);
        if changes.is_empty() {
            return Ok(AlbumOutcome::Unchanged);
        }
        self.catalog.update_album(record.id, &changes).await?;
        Ok(AlbumOutcome::Updated)
    }
}

fn album_changes(record: &AlbumRecord, album: &FullAlbum) -> AlbumChanges {
    let image_url = album.cover_url().map(str::to_string);
    AlbumChanges {
        popularity: (record.popularity != album.popularity).then_some(album.popularity),
        available_markets: (record.available_markets != album.available_markets)
            .then(|| album.available_markets.clone()),
        image_url: (record.image_url != image_url).then_some(image_url),
    }
}
