use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{Extension, Router, routing::get};
use tokio::sync::Mutex;

use crate::{
    api, config,
    error::{Error, Result},
    management::{Catalog, TokenStore},
    spotify::SpotifyApi,
    types::PkceState,
};

/// Everything the OAuth callback needs to finish an authorization.
pub struct AuthContext {
    pub pkce: Mutex<Option<PkceState>>,
    pub tokens: Arc<TokenStore>,
    pub api: SpotifyApi,
    pub catalog: Arc<dyn Catalog>,
}

/// Serves `/health` and `/callback` on `SERVER_ADDRESS` until the process
/// exits.
pub async fn start_api_server(context: Arc<AuthContext>) -> Result<()> {
    let app = Router::new()
        .route("/health", get(api::health))
        .route("/callback", get(api::callback).layer(Extension(context)));

    let addr = SocketAddr::from_str(&config::server_addr()?)
        .map_err(|e| Error::Config(format!("invalid SERVER_ADDRESS: {e}")))?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
