#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use sporlsync::{
    clock::Clock,
    config::{Settings, SpotifyCredentials},
    error::Result,
    genre::{GenreCategorizer, KeywordCategorizer},
    management::{MemoryCache, SqliteCatalog, TokenStore},
    spotify::{ApiRequest, ApiResponse, RateLimitedClient, RequestLimits, SpotifyApi, Transport},
    sync::CatalogSync,
};

pub const API_URL: &str = "https://api.test/v1";
pub const TOKEN_URL: &str = "https://accounts.test/api/token";
pub const AUTH_URL: &str = "https://accounts.test/authorize";

/// 2024-06-15 12:00:00 UTC. With the default release age of 14 days,
/// releases must be dated after 2024-06-01.
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Clock that only moves when something sleeps, and remembers every sleep.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

type Handler = Box<dyn Fn(&ApiRequest) -> ApiResponse + Send + Sync>;

/// Answers requests from a queue of canned responses first, then from a
/// handler. Every request is recorded.
pub struct ScriptedTransport {
    queued: Mutex<VecDeque<ApiResponse>>,
    handler: Handler,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(handler: impl Fn(&ApiRequest) -> ApiResponse + Send + Sync + 'static) -> Self {
        Self {
            queued: Mutex::new(VecDeque::new()),
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(responses: Vec<ApiResponse>) -> Self {
        let transport = Self::new(|_| status(404, "unexpected request"));
        transport.queued.lock().unwrap().extend(responses);
        transport
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Requests whose URL ends with `path`.
    pub fn requests_to(&self, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.ends_with(path))
            .collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let queued = self.queued.lock().unwrap().pop_front();
        Ok(queued.unwrap_or_else(|| (self.handler)(request)))
    }
}

pub fn ok(body: Value) -> ApiResponse {
    ApiResponse {
        status: 200,
        retry_after: None,
        body: body.to_string(),
    }
}

pub fn status(code: u16, body: &str) -> ApiResponse {
    ApiResponse {
        status: code,
        retry_after: None,
        body: body.to_string(),
    }
}

pub fn too_many_requests(retry_after: Option<u64>) -> ApiResponse {
    ApiResponse {
        status: 429,
        retry_after,
        body: String::new(),
    }
}

pub fn token_body(access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "token_type": "Bearer",
        "expires_in": 3600
    })
}

// ---------------------------------------------------------------------------
// Payload fixtures
// ---------------------------------------------------------------------------

pub fn simple_album(
    id: &str,
    name: &str,
    album_type: &str,
    release_date: &str,
    precision: &str,
    artist_id: &str,
) -> Value {
    json!({
        "id": id,
        "name": name,
        "album_type": album_type,
        "release_date": release_date,
        "release_date_precision": precision,
        "artists": [{ "id": artist_id, "name": format!("Artist {artist_id}") }]
    })
}

pub fn full_album(id: &str, album_type: &str, artist_id: &str, popularity: i64) -> Value {
    json!({
        "id": id,
        "name": format!("Album {id}"),
        "album_type": album_type,
        "release_date": "2024-06-10",
        "release_date_precision": "day",
        "artists": [{ "id": artist_id, "name": format!("Artist {artist_id}") }],
        "available_markets": ["DE", "US"],
        "images": [
            { "url": format!("https://img.test/{id}/640"), "height": 640, "width": 640 },
            { "url": format!("https://img.test/{id}/300"), "height": 300, "width": 300 },
            { "url": format!("https://img.test/{id}/64"), "height": 64, "width": 64 }
        ],
        "popularity": popularity
    })
}

pub fn full_artist(id: &str, genres: &[&str]) -> Value {
    json!({
        "id": id,
        "name": format!("Artist {id}"),
        "genres": genres
    })
}

/// Ids passed in the `ids` query parameter of a batched lookup.
pub fn ids_param(request: &ApiRequest) -> Vec<String> {
    request
        .param("ids")
        .map(|ids| ids.split(',').map(str::to_string).collect())
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Categorizer
// ---------------------------------------------------------------------------

/// Keyword categorizer that counts how often it was asked.
pub struct CountingCategorizer {
    inner: KeywordCategorizer,
    calls: AtomicUsize,
    names: Mutex<Vec<String>>,
}

impl CountingCategorizer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            inner: KeywordCategorizer::new(settings.genre_categories.clone()),
            calls: AtomicUsize::new(0),
            names: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn names(&self) -> Vec<String> {
        self.names.lock().unwrap().clone()
    }
}

impl GenreCategorizer for CountingCategorizer {
    fn categorize(&self, genre_name: &str) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.names.lock().unwrap().push(genre_name.to_string());
        self.inner.categorize(genre_name)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub fn credentials() -> SpotifyCredentials {
    SpotifyCredentials {
        client_id: "client-id".into(),
        client_secret: "client-secret".into(),
        redirect_uri: "http://127.0.0.1:8888/callback".into(),
        scope: "user-follow-read".into(),
        api_url: API_URL.into(),
        auth_url: AUTH_URL.into(),
        token_url: TOKEN_URL.into(),
    }
}

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub cache: Arc<MemoryCache>,
    pub transport: Arc<ScriptedTransport>,
    pub client: Arc<RateLimitedClient>,
    pub tokens: Arc<TokenStore>,
    pub api: SpotifyApi,
    pub catalog: Arc<SqliteCatalog>,
    pub categorizer: Arc<CountingCategorizer>,
    pub sync: CatalogSync,
}

pub async fn harness(transport: ScriptedTransport, settings: Settings) -> Harness {
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let cache = Arc::new(MemoryCache::new());
    let transport = Arc::new(transport);
    let limits = RequestLimits {
        attempts: settings.request_rate_limit_attempts,
        decay: Duration::from_secs(settings.request_rate_limit_decay),
    };
    let client = Arc::new(RateLimitedClient::new(
        transport.clone(),
        cache.clone(),
        clock.clone(),
        limits,
    ));
    let api = SpotifyApi::new(client.clone(), API_URL);
    let tokens = Arc::new(TokenStore::new(client.clone(), credentials()));
    let catalog = Arc::new(SqliteCatalog::in_memory().await.unwrap());
    let categorizer = Arc::new(CountingCategorizer::new(&settings));
    let sync = CatalogSync::new(
        api.clone(),
        tokens.clone(),
        catalog.clone(),
        categorizer.clone(),
        settings,
    );

    Harness {
        clock,
        cache,
        transport,
        client,
        tokens,
        api,
        catalog,
        categorizer,
        sync,
    }
}

/// Client over a scripted transport with the given budget, for client and
/// token tests that need no catalog.
pub fn client_with(
    transport: Arc<ScriptedTransport>,
    attempts: u32,
    decay_secs: u64,
) -> (Arc<RateLimitedClient>, Arc<ManualClock>, Arc<MemoryCache>) {
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let cache = Arc::new(MemoryCache::new());
    let client = Arc::new(RateLimitedClient::new(
        transport,
        cache.clone(),
        clock.clone(),
        RequestLimits {
            attempts,
            decay: Duration::from_secs(decay_secs),
        },
    ));
    (client, clock, cache)
}
