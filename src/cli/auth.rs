use std::sync::Arc;

use tokio::sync::Mutex;

use crate::{cli::Context, error::Result, server::AuthContext, spotify, success};

pub async fn auth(context: &Context) -> Result<()> {
    let auth_context = Arc::new(AuthContext {
        pkce: Mutex::new(None),
        tokens: Arc::clone(&context.tokens),
        api: context.api.clone(),
        catalog: context.catalog.clone(),
    });

    let user = spotify::auth::auth(auth_context).await?;
    success!("Authentication successful! Stored user {} ({}).", user.name, user.spotify_id);
    Ok(())
}
