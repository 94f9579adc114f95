use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool, sqlite::SqlitePoolOptions};

use crate::{
    error::Result,
    management::schema,
    types::{
        AlbumChanges, AlbumRecord, AlbumType, ArtistRecord, CatalogCounts, CleanupReport,
        GenreRecord, NewAlbum, SyncChanges, User,
    },
};

/// Persistence for users, artists, albums, genres and their associations.
///
/// Every write is an upsert or a set reconciliation, so running the same
/// sync twice against unchanged upstream data leaves the store untouched.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn upsert_user(&self, spotify_id: &str, name: &str, refresh_token: &str) -> Result<User>;
    async fn users(&self) -> Result<Vec<User>>;
    async fn update_refresh_token(&self, user_id: i64, refresh_token: &str) -> Result<()>;

    async fn artist_first_or_create(&self, spotify_id: &str, name: &str) -> Result<ArtistRecord>;
    async fn artist_by_spotify_id(&self, spotify_id: &str) -> Result<Option<ArtistRecord>>;
    async fn touch_artist(&self, artist_id: i64, checked_at: DateTime<Utc>) -> Result<()>;
    /// Followed artists never checked or last checked before `checked_before`.
    async fn stale_followed_artists(
        &self,
        checked_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ArtistRecord>>;
    async fn artists_without_genres(&self, after_id: i64, limit: i64) -> Result<Vec<ArtistRecord>>;

    async fn album_exists(&self, spotify_id: &str) -> Result<bool>;
    async fn album_first_or_create(&self, album: &NewAlbum) -> Result<AlbumRecord>;
    async fn albums_by_ids(&self, ids: &[i64]) -> Result<Vec<AlbumRecord>>;
    async fn album_ids_after(&self, after_id: i64, limit: i64) -> Result<Vec<i64>>;
    async fn update_album(&self, album_id: i64, changes: &AlbumChanges) -> Result<()>;
    async fn delete_album(&self, album_id: i64) -> Result<()>;

    async fn genre_first_or_create(&self, name: &str) -> Result<GenreRecord>;
    async fn category_first_or_create(&self, name: &str) -> Result<i64>;
    async fn set_genre_category(&self, genre_id: i64, category_id: i64) -> Result<()>;
    async fn artist_genre_ids(&self, artist_id: i64) -> Result<Vec<i64>>;

    async fn following_artist_ids(&self, user_id: i64) -> Result<Vec<i64>>;
    /// Makes the user's followings exactly `artist_ids`.
    async fn sync_followings(&self, user_id: i64, artist_ids: &[i64]) -> Result<SyncChanges>;
    /// Makes the artist's genre connections exactly `genre_ids`.
    async fn sync_artist_genres(&self, artist_id: i64, genre_ids: &[i64]) -> Result<SyncChanges>;

    async fn clear_artists(&self, artist_id_exceptions: &[String]) -> Result<CleanupReport>;
    async fn counts(&self) -> Result<CatalogCounts>;
}

#[derive(Debug, Clone)]
pub struct SqliteCatalog {
    pool: SqlitePool,
}

type ArtistRow = (i64, String, String, Option<i64>);
type AlbumRow = (
    i64,
    String,
    String,
    String,
    i64,
    String,
    Option<String>,
    i64,
    String,
);

const ALBUM_COLUMNS: &str =
    "id, spotify_id, name, release_date, artist_id, markets, image, popularity, type";

fn artist_from_row((id, spotify_id, name, checked_at): ArtistRow) -> ArtistRecord {
    ArtistRecord {
        id,
        spotify_id,
        name,
        checked_at: checked_at.and_then(|ts| Utc.timestamp_opt(ts, 0).single()),
    }
}

fn album_from_row(row: AlbumRow) -> Result<AlbumRecord> {
    let (id, spotify_id, name, release_date, artist_id, markets, image_url, popularity, kind) = row;
    let release_date = NaiveDate::parse_from_str(&release_date, "%Y-%m-%d")
        .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    Ok(AlbumRecord {
        id,
        spotify_id,
        name,
        release_date,
        artist_id,
        available_markets: serde_json::from_str(&markets)?,
        image_url,
        popularity,
        album_type: AlbumType::parse(&kind),
    })
}

impl SqliteCatalog {
    /// Opens the database at `url` and creates missing tables.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = schema::open_pool(url).await?;
        Self::new(pool).await
    }

    /// Single-connection in-memory database, used by tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::new(pool).await
    }

    pub async fn new(pool: SqlitePool) -> Result<Self> {
        schema::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn reconcile(
        &self,
        table: &str,
        owner_column: &str,
        member_column: &str,
        owner_id: i64,
        member_ids: &[i64],
    ) -> Result<SyncChanges> {
        let target: HashSet<i64> = member_ids.iter().copied().collect();
        let mut tx = self.pool.begin().await?;

        let existing: Vec<(i64,)> = sqlx::query_as(&format!(
            "SELECT {member_column} FROM {table} WHERE {owner_column} = ?"
        ))
        .bind(owner_id)
        .fetch_all(&mut *tx)
        .await?;
        let existing: HashSet<i64> = existing.into_iter().map(|(id,)| id).collect();

        let mut changes = SyncChanges::default();
        for id in target.difference(&existing) {
            sqlx::query(&format!(
                "INSERT OR IGNORE INTO {table} ({owner_column}, {member_column}) VALUES (?, ?)"
            ))
            .bind(owner_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            changes.attached += 1;
        }
        for id in existing.difference(&target) {
            sqlx::query(&format!(
                "DELETE FROM {table} WHERE {owner_column} = ? AND {member_column} = ?"
            ))
            .bind(owner_id)
            .bind(id)
            .execute(&mut *tx)
            .await?;
            changes.detached += 1;
        }

        tx.commit().await?;
        Ok(changes)
    }

    async fn delete_by_exceptions(
        &self,
        sql_prefix: &str,
        sql_suffix: &str,
        exceptions: &[String],
    ) -> Result<u64> {
        if exceptions.is_empty() {
            return Ok(0);
        }
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(sql_prefix);
        let mut separated = builder.separated(", ");
        for spotify_id in exceptions {
            separated.push_bind(spotify_id.as_str());
        }
        separated.push_unseparated(sql_suffix);
        let result = builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Catalog for SqliteCatalog {
    async fn upsert_user(&self, spotify_id: &str, name: &str, refresh_token: &str) -> Result<User> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO users (spotify_id, name, refresh_token) VALUES (?, ?, ?)
             ON CONFLICT(spotify_id) DO UPDATE SET name = excluded.name, refresh_token = excluded.refresh_token
             RETURNING id",
        )
        .bind(spotify_id)
        .bind(name)
        .bind(refresh_token)
        .fetch_one(&self.pool)
        .await?;

        Ok(User {
            id,
            spotify_id: spotify_id.to_string(),
            name: name.to_string(),
            refresh_token: refresh_token.to_string(),
        })
    }

    async fn users(&self) -> Result<Vec<User>> {
        let rows: Vec<(i64, String, String, String)> =
            sqlx::query_as("SELECT id, spotify_id, name, refresh_token FROM users ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, spotify_id, name, refresh_token)| User {
                id,
                spotify_id,
                name,
                refresh_token,
            })
            .collect())
    }

    async fn update_refresh_token(&self, user_id: i64, refresh_token: &str) -> Result<()> {
        sqlx::query("UPDATE users SET refresh_token = ? WHERE id = ?")
            .bind(refresh_token)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn artist_first_or_create(&self, spotify_id: &str, name: &str) -> Result<ArtistRecord> {
        sqlx::query("INSERT INTO artists (spotify_id, name) VALUES (?, ?) ON CONFLICT(spotify_id) DO NOTHING")
            .bind(spotify_id)
            .bind(name)
            .execute(&self.pool)
            .await?;

        let row: ArtistRow =
            sqlx::query_as("SELECT id, spotify_id, name, checked_at FROM artists WHERE spotify_id = ?")
                .bind(spotify_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(artist_from_row(row))
    }

    async fn artist_by_spotify_id(&self, spotify_id: &str) -> Result<Option<ArtistRecord>> {
        let row: Option<ArtistRow> =
            sqlx::query_as("SELECT id, spotify_id, name, checked_at FROM artists WHERE spotify_id = ?")
                .bind(spotify_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(artist_from_row))
    }

    async fn touch_artist(&self, artist_id: i64, checked_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE artists SET checked_at = ? WHERE id = ?")
            .bind(checked_at.timestamp())
            .bind(artist_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn stale_followed_artists(
        &self,
        checked_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<ArtistRecord>> {
        let rows: Vec<ArtistRow> = sqlx::query_as(
            "SELECT id, spotify_id, name, checked_at FROM artists
             WHERE id IN (SELECT artist_id FROM followings)
               AND (checked_at IS NULL OR checked_at < ?)
             ORDER BY checked_at IS NOT NULL, checked_at, id
             LIMIT ?",
        )
        .bind(checked_before.timestamp())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(artist_from_row).collect())
    }

    async fn artists_without_genres(&self, after_id: i64, limit: i64) -> Result<Vec<ArtistRecord>> {
        let rows: Vec<ArtistRow> = sqlx::query_as(
            "SELECT id, spotify_id, name, checked_at FROM artists
             WHERE id > ? AND id NOT IN (SELECT artist_id FROM connections)
             ORDER BY id
             LIMIT ?",
        )
        .bind(after_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(artist_from_row).collect())
    }

    async fn album_exists(&self, spotify_id: &str) -> Result<bool> {
        let (exists,): (i64,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM albums WHERE spotify_id = ?)")
                .bind(spotify_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists != 0)
    }

    async fn album_first_or_create(&self, album: &NewAlbum) -> Result<AlbumRecord> {
        sqlx::query(
            "INSERT INTO albums (spotify_id, name, release_date, artist_id, markets, image, popularity, type)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(spotify_id) DO NOTHING",
        )
        .bind(&album.spotify_id)
        .bind(&album.name)
        .bind(album.release_date.format("%Y-%m-%d").to_string())
        .bind(album.artist_id)
        .bind(serde_json::to_string(&album.available_markets)?)
        .bind(&album.image_url)
        .bind(album.popularity)
        .bind(album.album_type.as_str())
        .execute(&self.pool)
        .await?;

        let row: AlbumRow = sqlx::query_as(&format!(
            "SELECT {ALBUM_COLUMNS} FROM albums WHERE spotify_id = ?"
        ))
        .bind(&album.spotify_id)
        .fetch_one(&self.pool)
        .await?;
        album_from_row(row)
    }

    async fn albums_by_ids(&self, ids: &[i64]) -> Result<Vec<AlbumRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {ALBUM_COLUMNS} FROM albums WHERE id IN ("));
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id");

        let rows: Vec<AlbumRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(album_from_row).collect()
    }

    async fn album_ids_after(&self, after_id: i64, limit: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("SELECT id FROM albums WHERE id > ? ORDER BY id LIMIT ?")
                .bind(after_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn update_album(&self, album_id: i64, changes: &AlbumChanges) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE albums SET ");
        let mut separated = builder.separated(", ");
        if let Some(popularity) = changes.popularity {
            separated.push("popularity = ").push_bind_unseparated(popularity);
        }
        if let Some(markets) = &changes.available_markets {
            separated
                .push("markets = ")
                .push_bind_unseparated(serde_json::to_string(markets)?);
        }
        if let Some(image) = &changes.image_url {
            separated.push("image = ").push_bind_unseparated(image.clone());
        }
        builder.push(" WHERE id = ").push_bind(album_id);
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn delete_album(&self, album_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM albums WHERE id = ?")
            .bind(album_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn genre_first_or_create(&self, name: &str) -> Result<GenreRecord> {
        sqlx::query("INSERT INTO genres (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;

        let (id, name, category_id): (i64, String, Option<i64>) =
            sqlx::query_as("SELECT id, name, category_id FROM genres WHERE name = ?")
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        Ok(GenreRecord {
            id,
            name,
            category_id,
        })
    }

    async fn category_first_or_create(&self, name: &str) -> Result<i64> {
        sqlx::query("INSERT INTO categories (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&self.pool)
            .await?;
        let (id,): (i64,) = sqlx::query_as("SELECT id FROM categories WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(id)
    }

    async fn set_genre_category(&self, genre_id: i64, category_id: i64) -> Result<()> {
        sqlx::query("UPDATE genres SET category_id = ? WHERE id = ?")
            .bind(category_id)
            .bind(genre_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn artist_genre_ids(&self, artist_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT genre_id FROM connections WHERE artist_id = ? ORDER BY genre_id",
        )
        .bind(artist_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn following_artist_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT artist_id FROM followings WHERE user_id = ? ORDER BY artist_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn sync_followings(&self, user_id: i64, artist_ids: &[i64]) -> Result<SyncChanges> {
        self.reconcile("followings", "user_id", "artist_id", user_id, artist_ids)
            .await
    }

    async fn sync_artist_genres(&self, artist_id: i64, genre_ids: &[i64]) -> Result<SyncChanges> {
        self.reconcile("connections", "artist_id", "genre_id", artist_id, genre_ids)
            .await
    }

    async fn clear_artists(&self, artist_id_exceptions: &[String]) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();

        report.without_albums = sqlx::query(
            "DELETE FROM artists
             WHERE id NOT IN (SELECT artist_id FROM followings)
               AND id NOT IN (SELECT artist_id FROM albums)",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        report.exception_albums = self
            .delete_by_exceptions(
                "DELETE FROM albums WHERE artist_id IN (SELECT id FROM artists WHERE spotify_id IN (",
                "))",
                artist_id_exceptions,
            )
            .await?;
        report.exceptions = self
            .delete_by_exceptions(
                "DELETE FROM artists WHERE spotify_id IN (",
                ")",
                artist_id_exceptions,
            )
            .await?;

        report.without_genres_albums = sqlx::query(
            "DELETE FROM albums WHERE artist_id IN (
                SELECT id FROM artists
                WHERE id NOT IN (SELECT artist_id FROM followings)
                  AND id NOT IN (SELECT artist_id FROM connections))",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        report.without_genres = sqlx::query(
            "DELETE FROM artists
             WHERE id NOT IN (SELECT artist_id FROM followings)
               AND id NOT IN (SELECT artist_id FROM connections)",
        )
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(report)
    }

    async fn counts(&self) -> Result<CatalogCounts> {
        let (users, artists, albums, genres, followings): (i64, i64, i64, i64, i64) =
            sqlx::query_as(
                "SELECT
                    (SELECT COUNT(*) FROM users),
                    (SELECT COUNT(*) FROM artists),
                    (SELECT COUNT(*) FROM albums),
                    (SELECT COUNT(*) FROM genres),
                    (SELECT COUNT(*) FROM followings)",
            )
            .fetch_one(&self.pool)
            .await?;
        Ok(CatalogCounts {
            users,
            artists,
            albums,
            genres,
            followings,
        })
    }
}
