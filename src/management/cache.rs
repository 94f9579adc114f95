use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::Mutex;

use crate::{error::Result, management::schema};

/// Outcome of asking the shared budget for one request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    Granted,
    /// The window is full; a slot frees up after `available_in`.
    Exhausted { available_in: Duration },
}

/// Key/value state shared by every concurrently running unit of work.
///
/// `hit` must be atomic: two units racing for the last slot of a window
/// must not both be granted.
#[async_trait]
pub trait SharedCache: Send + Sync {
    /// Claims one slot of a fixed window of `decay` holding at most
    /// `max_attempts` hits. The window starts with the first hit after the
    /// previous window expired.
    async fn hit(
        &self,
        key: &str,
        max_attempts: u32,
        decay: Duration,
        now: DateTime<Utc>,
    ) -> Result<Budget>;

    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>>;

    async fn put(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) -> Result<()>;

    /// Stores `value` only when `key` is missing or expired at `now`.
    /// Returns whether this call stored it. Atomic like `hit`.
    async fn add(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool>;

    async fn forget(&self, key: &str) -> Result<()>;
}

fn available_in(window_start: i64, decay: i64, now: i64) -> Duration {
    Duration::from_secs((window_start + decay - now).max(1) as u64)
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Option<i64>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    hits: u32,
    start: i64,
}

/// Process-local cache. Only suitable when every unit runs inside the same
/// process, and for tests.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedCache for MemoryCache {
    async fn hit(
        &self,
        key: &str,
        max_attempts: u32,
        decay: Duration,
        now: DateTime<Utc>,
    ) -> Result<Budget> {
        let now = now.timestamp();
        let decay = decay.as_secs() as i64;
        let mut windows = self.windows.lock().await;

        let window = windows.entry(key.to_string()).or_insert(Window {
            hits: 0,
            start: now,
        });
        if window.start + decay <= now {
            *window = Window {
                hits: 0,
                start: now,
            };
        }

        if window.hits < max_attempts {
            window.hits += 1;
            Ok(Budget::Granted)
        } else {
            Ok(Budget::Exhausted {
                available_in: available_in(window.start, decay, now),
            })
        }
    }

    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        Ok(entries
            .get(key)
            .filter(|e| e.expires_at.is_none_or(|at| at > now.timestamp()))
            .map(|e| e.value.clone()))
    }

    async fn put(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        self.entries.lock().await.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: expires_at.map(|at| at.timestamp()),
            },
        );
        Ok(())
    }

    async fn add(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        let live = entries
            .get(key)
            .is_some_and(|e| e.expires_at.is_none_or(|at| at > now.timestamp()));
        if live {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: expires_at.map(|at| at.timestamp()),
            },
        );
        Ok(true)
    }

    async fn forget(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

/// Cache stored in the shared SQLite database, visible to every process
/// that opens the same file.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

impl SqliteCache {
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        schema::migrate(&pool).await?;
        Ok(Self { pool })
    }
}

// Either resets an expired window or increments a non-full one in a single
// statement. When the window is full the conditional update is skipped and
// no row comes back.
const HIT_SQL: &str = "
    INSERT INTO rate_limits (key, hits, window_start) VALUES (?1, 1, ?2)
    ON CONFLICT(key) DO UPDATE SET
        hits = CASE WHEN rate_limits.window_start + ?3 <= ?2 THEN 1 ELSE rate_limits.hits + 1 END,
        window_start = CASE WHEN rate_limits.window_start + ?3 <= ?2 THEN ?2 ELSE rate_limits.window_start END
    WHERE rate_limits.window_start + ?3 <= ?2 OR rate_limits.hits < ?4
    RETURNING hits";

// Replaces the row only when it has expired; a live row makes the update
// a no-op and nothing is returned.
const ADD_SQL: &str = "
    INSERT INTO cache_entries (key, value, expires_at) VALUES (?1, ?2, ?3)
    ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        expires_at = excluded.expires_at
    WHERE cache_entries.expires_at IS NOT NULL AND cache_entries.expires_at <= ?4
    RETURNING key";

#[async_trait]
impl SharedCache for SqliteCache {
    async fn hit(
        &self,
        key: &str,
        max_attempts: u32,
        decay: Duration,
        now: DateTime<Utc>,
    ) -> Result<Budget> {
        let now = now.timestamp();
        let decay = decay.as_secs() as i64;

        let granted: Option<(i64,)> = sqlx::query_as(HIT_SQL)
            .bind(key)
            .bind(now)
            .bind(decay)
            .bind(max_attempts as i64)
            .fetch_optional(&self.pool)
            .await?;

        if granted.is_some() {
            return Ok(Budget::Granted);
        }

        let (window_start,): (i64,) =
            sqlx::query_as("SELECT window_start FROM rate_limits WHERE key = ?")
                .bind(key)
                .fetch_one(&self.pool)
                .await?;

        Ok(Budget::Exhausted {
            available_in: available_in(window_start, decay, now),
        })
    }

    async fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT value FROM cache_entries
             WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(now.timestamp())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(value,)| value))
    }

    async fn put(&self, key: &str, value: &str, expires_at: Option<DateTime<Utc>>) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO cache_entries (key, value, expires_at) VALUES (?, ?, ?)")
            .bind(key)
            .bind(value)
            .bind(expires_at.map(|at| at.timestamp()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add(
        &self,
        key: &str,
        value: &str,
        expires_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let stored: Option<(String,)> = sqlx::query_as(ADD_SQL)
            .bind(key)
            .bind(value)
            .bind(expires_at.map(|at| at.timestamp()))
            .bind(now.timestamp())
            .fetch_optional(&self.pool)
            .await?;
        Ok(stored.is_some())
    }

    async fn forget(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
