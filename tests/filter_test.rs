mod common;

use common::*;
use serde_json::Value;
use sporlsync::{
    config::Settings,
    management::Catalog,
    sync::{AlbumFilter, Rejection},
    types::{AlbumType, NewAlbum, SimpleAlbum},
};

fn album(value: Value) -> SimpleAlbum {
    serde_json::from_value(value).unwrap()
}

fn day_album(name: &str, album_type: &str, release_date: &str) -> SimpleAlbum {
    album(simple_album(
        "album-1",
        name,
        album_type,
        release_date,
        "day",
        "artist-1",
    ))
}

fn rejection(album: &SimpleAlbum) -> Option<Rejection> {
    AlbumFilter::new(&Settings::default()).rejection(album, fixed_now())
}

#[test]
fn test_accepts_recent_album_and_single() {
    assert_eq!(rejection(&day_album("Fresh", "album", "2024-06-10")), None);
    assert_eq!(rejection(&day_album("Fresh", "single", "2024-06-15")), None);
}

#[test]
fn test_rejects_compilations_and_unknown_types() {
    assert_eq!(
        rejection(&day_album("Fresh", "compilation", "2024-06-10")),
        Some(Rejection::AlbumType)
    );
    assert_eq!(
        rejection(&day_album("Fresh", "appears_on", "2024-06-10")),
        Some(Rejection::AlbumType)
    );
}

#[test]
fn test_release_date_must_be_after_threshold() {
    // Threshold is 2024-06-01 for a 14 day window
    assert_eq!(rejection(&day_album("Fresh", "album", "2024-06-02")), None);
    assert_eq!(
        rejection(&day_album("Fresh", "album", "2024-06-01")),
        Some(Rejection::ReleaseDate)
    );
    assert_eq!(
        rejection(&day_album("Fresh", "album", "2023-06-10")),
        Some(Rejection::ReleaseDate)
    );
}

#[test]
fn test_rejects_imprecise_or_malformed_dates() {
    let month = album(simple_album(
        "album-1", "Fresh", "album", "2024-06", "month", "artist-1",
    ));
    let year = album(simple_album(
        "album-1", "Fresh", "album", "2024", "year", "artist-1",
    ));
    let broken = day_album("Fresh", "album", "2024-06-xx");

    assert_eq!(rejection(&month), Some(Rejection::ReleaseDate));
    assert_eq!(rejection(&year), Some(Rejection::ReleaseDate));
    assert_eq!(rejection(&broken), Some(Rejection::ReleaseDate));
}

#[test]
fn test_name_exceptions_ignore_case() {
    assert_eq!(
        rejection(&day_album("Alive (LIVE at Wembley)", "album", "2024-06-10")),
        Some(Rejection::Name)
    );
    assert_eq!(
        rejection(&day_album("Songs - Deluxe Edition", "album", "2024-06-10")),
        Some(Rejection::Name)
    );
    assert_eq!(
        rejection(&day_album("Remixed", "single", "2024-06-10")),
        Some(Rejection::Name)
    );
}

#[test]
fn test_custom_exception_list_is_lowercased() {
    let settings = Settings {
        exceptions: vec!["Karaoke".into(), String::new()],
        ..Settings::default()
    };
    let filter = AlbumFilter::new(&settings);

    let karaoke = day_album("KARAOKE hits", "album", "2024-06-10");
    let live = day_album("Live", "album", "2024-06-10");

    assert_eq!(filter.rejection(&karaoke, fixed_now()), Some(Rejection::Name));
    // The default list is replaced, and an empty entry matches nothing
    assert_eq!(filter.rejection(&live, fixed_now()), None);
}

#[test]
fn test_rejects_excluded_primary_artist() {
    let bach = album(simple_album(
        "album-1",
        "Cello Suites",
        "album",
        "2024-06-10",
        "day",
        "5aIqB5nVVvmFsvSdExz408",
    ));
    assert_eq!(rejection(&bach), Some(Rejection::ExcludedArtist));
}

#[test]
fn test_rejects_album_without_artists() {
    let mut orphan = day_album("Fresh", "album", "2024-06-10");
    orphan.artists.clear();
    assert_eq!(rejection(&orphan), Some(Rejection::MissingArtist));
}

#[tokio::test]
async fn test_is_album_ok_rejects_stored_album() {
    let h = harness(
        ScriptedTransport::new(|_| status(404, "")),
        Settings::default(),
    )
    .await;
    let candidate = day_album("Fresh", "album", "2024-06-10");

    assert!(h.sync.is_album_ok(&candidate).await.unwrap());

    let artist = h
        .catalog
        .artist_first_or_create("artist-1", "Artist artist-1")
        .await
        .unwrap();
    h.catalog
        .album_first_or_create(&NewAlbum {
            spotify_id: "album-1".into(),
            name: "Fresh".into(),
            release_date: chrono::NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            artist_id: artist.id,
            available_markets: vec!["DE".into()],
            image_url: None,
            popularity: 10,
            album_type: AlbumType::Album,
        })
        .await
        .unwrap();

    assert!(!h.sync.is_album_ok(&candidate).await.unwrap());
    assert_eq!(
        h.sync.album_rejection(&candidate).await.unwrap(),
        Some(Rejection::AlreadyStored)
    );
    // No request is needed to decide
    assert!(h.transport.requests().is_empty());
}
