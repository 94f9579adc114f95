use std::{sync::Arc, time::Duration};

use crate::{
    clock::SystemClock,
    config::{self, Settings, SpotifyCredentials},
    error::Result,
    genre::KeywordCategorizer,
    management::{SqliteCache, SqliteCatalog, TokenStore, schema},
    spotify::{RateLimitedClient, RequestLimits, ReqwestTransport, SpotifyApi},
    sync::CatalogSync,
};

/// Collaborators shared by the command handlers of one process.
pub struct Context {
    pub settings: Settings,
    pub catalog: Arc<SqliteCatalog>,
    pub client: Arc<RateLimitedClient>,
    pub tokens: Arc<TokenStore>,
    pub api: SpotifyApi,
    pub sync: CatalogSync,
}

impl Context {
    /// Opens the shared database and wires the client, the token store and
    /// the sync jobs from the environment and `settings`.
    pub async fn init(settings: Settings) -> Result<Self> {
        let credentials = SpotifyCredentials::from_env()?;

        let pool = schema::open_pool(&config::database_url()).await?;
        let catalog = Arc::new(SqliteCatalog::new(pool.clone()).await?);
        let cache = Arc::new(SqliteCache::new(pool).await?);

        let limits = RequestLimits {
            attempts: settings.request_rate_limit_attempts,
            decay: Duration::from_secs(settings.request_rate_limit_decay),
        };
        let client = Arc::new(RateLimitedClient::new(
            Arc::new(ReqwestTransport::new()?),
            cache,
            Arc::new(SystemClock),
            limits,
        ));

        let api = SpotifyApi::new(Arc::clone(&client), credentials.api_url.clone());
        let tokens = Arc::new(TokenStore::new(Arc::clone(&client), credentials));
        let categorizer = Arc::new(KeywordCategorizer::new(settings.genre_categories.clone()));
        let sync = CatalogSync::new(
            api.clone(),
            Arc::clone(&tokens),
            catalog.clone(),
            categorizer,
            settings.clone(),
        );

        Ok(Self {
            settings,
            catalog,
            client,
            tokens,
            api,
            sync,
        })
    }
}
