use std::{collections::HashMap, sync::Arc};

use axum::{Extension, extract::Query, response::Html};
use tracing::{error, info};

use crate::{error::Result, server::AuthContext, types::User};

pub async fn callback(
    Query(params): Query<HashMap<String, String>>,
    Extension(context): Extension<Arc<AuthContext>>,
) -> Html<&'static str> {
    let verifier = {
        let mut pkce = context.pkce.lock().await;
        let Some(pkce_state) = pkce.as_mut() else {
            return Html("<h4>No authorization in progress.</h4>");
        };

        if params.get("state") != Some(&pkce_state.state) {
            pkce_state.failure = Some("state mismatch".into());
            return Html("<h4>Login failed.</h4>");
        }

        if let Some(reason) = params.get("error") {
            pkce_state.failure = Some(format!("authorization denied: {reason}"));
            return Html("<h4>Login failed.</h4>");
        }

        pkce_state.code_verifier.clone()
    };

    let Some(code) = params.get("code") else {
        return Html("<h4>Missing authorization code.</h4>");
    };

    // The lock is not held across the exchange; `wait_for_user` keeps polling it
    let outcome = store_user(&context, code, &verifier).await;

    let mut pkce = context.pkce.lock().await;
    let Some(pkce_state) = pkce.as_mut() else {
        return Html("<h4>No authorization in progress.</h4>");
    };
    match outcome {
        Ok(user) => {
            info!(user_id = user.id, spotify_id = %user.spotify_id, "user authorized");
            pkce_state.user = Some(user);
            Html("<h2>Authentication successful.</h2><p>Close browser window.</p>")
        }
        Err(e) => {
            error!(error = %e, "token exchange failed");
            pkce_state.failure = Some(e.to_string());
            Html("<h4>Login failed.</h4>")
        }
    }
}

async fn store_user(context: &AuthContext, code: &str, verifier: &str) -> Result<User> {
    let (token, refresh_token) = context.tokens.exchange_code(code, verifier).await?;
    let profile = context.api.me(&token).await?;
    let name = profile.display_name.unwrap_or_else(|| profile.id.clone());
    context
        .catalog
        .upsert_user(&profile.id, &name, &refresh_token)
        .await
}
