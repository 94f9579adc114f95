use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::{
    config::Settings,
    types::{AlbumType, SimpleAlbum},
    utils,
};

/// Why an album was kept out of the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlbumType,
    ReleaseDate,
    Name,
    ExcludedArtist,
    MissingArtist,
    AlreadyStored,
}

/// The payload-only half of the album acceptance predicate.
///
/// The stored-album half lives in [`super::CatalogSync::is_album_ok`], which
/// is the only place albums are admitted through.
#[derive(Debug, Clone)]
pub struct AlbumFilter {
    release_age: i64,
    name_exceptions: Vec<String>,
    artist_id_exceptions: HashSet<String>,
}

impl AlbumFilter {
    pub fn new(settings: &Settings) -> Self {
        Self {
            release_age: settings.release_age,
            name_exceptions: settings
                .exceptions
                .iter()
                .filter(|e| !e.is_empty())
                .map(|e| e.to_lowercase())
                .collect(),
            artist_id_exceptions: settings.artist_id_exceptions.iter().cloned().collect(),
        }
    }

    pub fn is_artist_excluded(&self, artist_spotify_id: &str) -> bool {
        self.artist_id_exceptions.contains(artist_spotify_id)
    }

    pub fn rejection(&self, album: &SimpleAlbum, now: DateTime<Utc>) -> Option<Rejection> {
        if !matches!(album.album_type, AlbumType::Album | AlbumType::Single) {
            return Some(Rejection::AlbumType);
        }

        let threshold = utils::release_date_threshold(now, self.release_age);
        match utils::parse_day_release_date(&album.release_date, album.release_date_precision) {
            Some(date) if date > threshold => {}
            _ => return Some(Rejection::ReleaseDate),
        }

        let name = album.name.to_lowercase();
        if self.name_exceptions.iter().any(|e| name.contains(e.as_str())) {
            return Some(Rejection::Name);
        }

        match album.primary_artist() {
            None => Some(Rejection::MissingArtist),
            Some(artist) if self.is_artist_excluded(&artist.id) => Some(Rejection::ExcludedArtist),
            Some(_) => None,
        }
    }
}
