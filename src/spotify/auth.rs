use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::Instant};

use crate::{
    error::{Error, Result},
    server::{AuthContext, start_api_server},
    types::{PkceState, User},
    utils, warning,
};

const CALLBACK_TIMEOUT: Duration = Duration::from_secs(120);

/// Runs the authorization-code flow with PKCE for one user.
///
/// Starts the callback server, sends the user to the authorization page and
/// waits until the callback has stored the user or reported a failure.
pub async fn auth(context: Arc<AuthContext>) -> Result<User> {
    let code_verifier = utils::generate_code_verifier();
    let code_challenge = utils::generate_code_challenge(&code_verifier);
    let state = utils::generate_state();
    let auth_url = context.tokens.authorize_url(&state, &code_challenge)?;

    {
        let mut lock = context.pkce.lock().await;
        *lock = Some(PkceState {
            code_verifier,
            state,
            user: None,
            failure: None,
        });
    }

    let server_context = Arc::clone(&context);
    let mut server = tokio::spawn(async move { start_api_server(server_context).await });

    if webbrowser::open(&auth_url).is_err() {
        warning!(
            "Failed to open browser. Please navigate to the following URL manually:\n{}",
            auth_url
        );
    }

    let outcome = wait_for_user(&context, &mut server).await;
    server.abort();
    outcome
}

async fn wait_for_user(context: &AuthContext, server: &mut JoinHandle<Result<()>>) -> Result<User> {
    let start = Instant::now();

    while start.elapsed() < CALLBACK_TIMEOUT {
        if server.is_finished() {
            return match server.await {
                Ok(Err(e)) => Err(e),
                _ => Err(Error::Auth {
                    reason: "callback server stopped".into(),
                }),
            };
        }
        {
            let lock = context.pkce.lock().await;
            if let Some(pkce) = lock.as_ref() {
                if let Some(user) = &pkce.user {
                    return Ok(user.clone());
                }
                if let Some(reason) = &pkce.failure {
                    return Err(Error::Auth {
                        reason: reason.clone(),
                    });
                }
            }
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    Err(Error::Auth {
        reason: "authorization timed out".into(),
    })
}
