use std::{sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use reqwest::Method;
use tracing::{error, warn};

use crate::{
    config::SpotifyCredentials,
    error::{Error, Result},
    spotify::RateLimitedClient,
    types::{Token, TokenResponse, TokenScope, User},
};

pub const CLIENT_TOKEN_KEY: &str = "client_access_token";

const CLIENT_TOKEN_ATTEMPTS: u32 = 3;
const CLIENT_TOKEN_PAUSE: Duration = Duration::from_secs(3);
/// Tokens are treated as expired this long before the upstream expiry.
const EXPIRY_MARGIN_SECS: i64 = 10;

/// Obtains bearer tokens for users (refresh-token grant) and for the
/// application itself (client-credentials grant).
///
/// User tokens are never cached: every call exchanges the user's refresh
/// token. The client token lives in the shared cache until shortly before
/// it expires and is shared by every unit.
pub struct TokenStore {
    client: Arc<RateLimitedClient>,
    credentials: SpotifyCredentials,
}

impl TokenStore {
    pub fn new(client: Arc<RateLimitedClient>, credentials: SpotifyCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Exchanges the user's stored refresh token for a fresh access token.
    ///
    /// If the token endpoint rotates the refresh token, the new one is set on
    /// the returned token so the caller can persist it.
    ///
    /// # Errors
    ///
    /// `Auth` when the token endpoint rejects the refresh token. Rate limit
    /// and retry errors from the client are passed through unchanged.
    pub async fn get_user_access_token(&self, user: &User) -> Result<Token> {
        let response = self
            .token_grant(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", user.refresh_token.as_str()),
            ])
            .await
            .map_err(|e| match e {
                Error::Upstream { status, body, .. } => Error::Auth {
                    reason: format!("refresh token rejected for user {}: {status} {body}", user.id),
                },
                other => other,
            })?;

        let rotated = response
            .refresh_token
            .clone()
            .filter(|t| !t.is_empty() && t != &user.refresh_token);
        let mut token = self.build_token(response, TokenScope::User);
        token.refresh_token = rotated;
        Ok(token)
    }

    /// Returns the cached client-credentials token, requesting a new one when
    /// the cache is empty or expired.
    ///
    /// A new token is requested up to three times with a three second pause
    /// between attempts. `RateLimitExceeded` is returned as is, without a
    /// retry. Concurrent callers on a cache miss may each request
    /// one; the endpoint tolerates that.
    pub async fn get_client_access_token(&self) -> Result<Token> {
        let now = self.client.clock().now();
        if let Some(cached) = self.client.cache().get(CLIENT_TOKEN_KEY, now).await? {
            match serde_json::from_str::<Token>(&cached) {
                Ok(token) if !token.is_expired(now) => return Ok(token),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "discarding unreadable cached client token"),
            }
        }

        let mut last_error = None;
        for attempt in 1..=CLIENT_TOKEN_ATTEMPTS {
            match self
                .token_grant(&[("grant_type", "client_credentials")])
                .await
            {
                Ok(response) => {
                    let token = self.build_token(response, TokenScope::Client);
                    self.save_client_token(&token).await;
                    return Ok(token);
                }
                // A cooldown is running; retrying would only hit it again
                Err(e @ Error::RateLimitExceeded { .. }) => return Err(e),
                Err(e) => {
                    warn!(attempt, error = %e, "client credentials request failed");
                    last_error = Some(e);
                    if attempt < CLIENT_TOKEN_ATTEMPTS {
                        self.client.clock().sleep(CLIENT_TOKEN_PAUSE).await;
                    }
                }
            }
        }

        Err(Error::Auth {
            reason: format!(
                "access token not received: {}",
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ),
        })
    }

    /// Builds the authorization URL the user is sent to by the `auth` command.
    pub fn authorize_url(&self, state: &str, code_challenge: &str) -> Result<String> {
        let url = reqwest::Url::parse_with_params(
            &self.credentials.auth_url,
            &[
                ("client_id", self.credentials.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("code_challenge_method", "S256"),
                ("code_challenge", code_challenge),
                ("scope", self.credentials.scope.as_str()),
                ("state", state),
                ("show_dialog", "true"),
            ],
        )
        .map_err(|e| Error::Config(format!("invalid authorization url: {e}")))?;
        Ok(url.into())
    }

    /// Completes the authorization-code grant.
    ///
    /// Returns the user access token together with the refresh token that
    /// must be stored on the user record.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<(Token, String)> {
        let response = self
            .token_grant(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
                ("code_verifier", code_verifier),
            ])
            .await
            .map_err(|e| Error::Auth {
                reason: format!("authorization code exchange failed: {e}"),
            })?;

        let refresh_token = response.refresh_token.clone().ok_or_else(|| Error::Auth {
            reason: "token response carried no refresh token".into(),
        })?;
        Ok((self.build_token(response, TokenScope::User), refresh_token))
    }

    async fn token_grant(&self, params: &[(&str, &str)]) -> Result<TokenResponse> {
        let basic = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.client_id, self.credentials.client_secret
        ));
        let authorization = format!("Basic {basic}");

        self.client
            .request(
                Method::POST,
                &self.credentials.token_url,
                params,
                &[("Authorization", authorization.as_str())],
            )
            .await
    }

    fn build_token(&self, response: TokenResponse, scope: TokenScope) -> Token {
        Token {
            value: response.access_token,
            expires_at: expiry(self.client.clock().now(), response.expires_in),
            scope,
            refresh_token: None,
        }
    }

    async fn save_client_token(&self, token: &Token) {
        let stored = match serde_json::to_string(token) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to encode client token");
                return;
            }
        };
        if let Err(e) = self
            .client
            .cache()
            .put(CLIENT_TOKEN_KEY, &stored, Some(token.expires_at))
            .await
        {
            error!(error = %e, "failed to cache client token");
        }
    }
}

fn expiry(now: DateTime<Utc>, expires_in: i64) -> DateTime<Utc> {
    now + chrono::Duration::seconds(expires_in - EXPIRY_MARGIN_SECS)
}
