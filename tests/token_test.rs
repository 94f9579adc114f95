mod common;

use std::{sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::STANDARD};
use common::*;
use reqwest::Method;
use serde_json::json;
use sporlsync::{
    Error,
    clock::Clock,
    management::{CLIENT_TOKEN_KEY, MemoryCache, SharedCache, TokenStore},
    types::{TokenScope, User},
};

fn user(refresh_token: &str) -> User {
    User {
        id: 1,
        spotify_id: "listener".into(),
        name: "Listener".into(),
        refresh_token: refresh_token.into(),
    }
}

fn store(transport: Arc<ScriptedTransport>) -> (TokenStore, Arc<ManualClock>, Arc<MemoryCache>) {
    let (client, clock, cache) = client_with(transport, 100, 30);
    (TokenStore::new(client, credentials()), clock, cache)
}

#[tokio::test]
async fn test_client_token_is_cached() {
    let transport = Arc::new(ScriptedTransport::new(|_| ok(token_body("client-1"))));
    let (tokens, clock, cache) = store(transport.clone());

    let first = tokens.get_client_access_token().await.unwrap();
    let second = tokens.get_client_access_token().await.unwrap();

    assert_eq!(first.value, "client-1");
    assert_eq!(first.scope, TokenScope::Client);
    assert_eq!(first, second);
    assert_eq!(transport.requests().len(), 1);
    assert!(cache.get(CLIENT_TOKEN_KEY, clock.now()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_client_token_request_uses_basic_auth() {
    let transport = Arc::new(ScriptedTransport::new(|_| ok(token_body("client-1"))));
    let (tokens, _, _) = store(transport.clone());

    tokens.get_client_access_token().await.unwrap();

    let request = &transport.requests()[0];
    let expected = format!("Basic {}", STANDARD.encode("client-id:client-secret"));
    assert_eq!(request.method, Method::POST);
    assert_eq!(request.url, TOKEN_URL);
    assert_eq!(request.param("grant_type"), Some("client_credentials"));
    assert_eq!(request.header("Authorization"), Some(expected.as_str()));
}

#[tokio::test]
async fn test_client_token_expires_ten_seconds_early() {
    let transport = Arc::new(ScriptedTransport::new(|_| ok(token_body("client-1"))));
    let (tokens, clock, _) = store(transport.clone());

    let token = tokens.get_client_access_token().await.unwrap();
    assert_eq!(
        token.expires_at,
        fixed_now() + chrono::Duration::seconds(3600 - 10)
    );

    clock.advance(Duration::from_secs(3589));
    tokens.get_client_access_token().await.unwrap();
    assert_eq!(transport.requests().len(), 1);

    clock.advance(Duration::from_secs(1));
    tokens.get_client_access_token().await.unwrap();
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_client_token_retries_three_times_then_fails() {
    let transport = Arc::new(ScriptedTransport::new(|_| status(503, "unavailable")));
    let (tokens, clock, cache) = store(transport.clone());

    let err = tokens.get_client_access_token().await.unwrap_err();

    assert!(matches!(err, Error::Auth { .. }));
    assert_eq!(transport.requests().len(), 3);
    // Pauses only between attempts
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(3); 2]);
    assert!(cache.get(CLIENT_TOKEN_KEY, clock.now()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_client_token_recovers_on_second_attempt() {
    let transport = Arc::new(ScriptedTransport::queue(vec![
        status(500, "oops"),
        ok(token_body("client-2")),
    ]));
    let (tokens, clock, _) = store(transport.clone());

    let token = tokens.get_client_access_token().await.unwrap();

    assert_eq!(token.value, "client-2");
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(3)]);
}

#[tokio::test]
async fn test_user_token_is_never_cached() {
    let transport = Arc::new(ScriptedTransport::new(|_| ok(token_body("user-token"))));
    let (tokens, _, _) = store(transport.clone());
    let user = user("refresh-1");

    let token = tokens.get_user_access_token(&user).await.unwrap();
    tokens.get_user_access_token(&user).await.unwrap();

    assert_eq!(token.value, "user-token");
    assert_eq!(token.scope, TokenScope::User);
    assert_eq!(token.refresh_token, None);

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].param("grant_type"), Some("refresh_token"));
    assert_eq!(requests[0].param("refresh_token"), Some("refresh-1"));
}

#[tokio::test]
async fn test_user_token_reports_rotated_refresh_token() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        ok(json!({
            "access_token": "user-token",
            "expires_in": 3600,
            "refresh_token": "refresh-2"
        }))
    }));
    let (tokens, _, _) = store(transport);

    let token = tokens.get_user_access_token(&user("refresh-1")).await.unwrap();
    assert_eq!(token.refresh_token.as_deref(), Some("refresh-2"));

    // Echoing the same refresh token back is not a rotation
    let token = tokens.get_user_access_token(&user("refresh-2")).await.unwrap();
    assert_eq!(token.refresh_token, None);
}

#[tokio::test]
async fn test_rejected_refresh_token_is_an_auth_error() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        status(400, r#"{"error":"invalid_grant"}"#)
    }));
    let (tokens, _, _) = store(transport.clone());

    let err = tokens.get_user_access_token(&user("revoked")).await.unwrap_err();

    assert!(matches!(err, Error::Auth { .. }));
    assert!(err.is_unit_fatal());
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn test_authorize_url_carries_pkce_parameters() {
    let transport = Arc::new(ScriptedTransport::new(|_| ok(json!({}))));
    let (tokens, _, _) = store(transport);

    let url = tokens.authorize_url("state-123", "challenge-abc").unwrap();
    let url = reqwest::Url::parse(&url).unwrap();
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };

    assert!(url.as_str().starts_with(AUTH_URL));
    assert_eq!(param("client_id").as_deref(), Some("client-id"));
    assert_eq!(param("response_type").as_deref(), Some("code"));
    assert_eq!(param("code_challenge_method").as_deref(), Some("S256"));
    assert_eq!(param("code_challenge").as_deref(), Some("challenge-abc"));
    assert_eq!(param("state").as_deref(), Some("state-123"));
    assert_eq!(
        param("redirect_uri").as_deref(),
        Some("http://127.0.0.1:8888/callback")
    );
}

#[tokio::test]
async fn test_exchange_code_returns_refresh_token() {
    let transport = Arc::new(ScriptedTransport::new(|_| {
        ok(json!({
            "access_token": "user-token",
            "expires_in": 3600,
            "refresh_token": "refresh-new"
        }))
    }));
    let (tokens, _, _) = store(transport.clone());

    let (token, refresh_token) = tokens.exchange_code("code-1", "verifier-1").await.unwrap();

    assert_eq!(token.value, "user-token");
    assert_eq!(refresh_token, "refresh-new");

    let request = &transport.requests()[0];
    assert_eq!(request.param("grant_type"), Some("authorization_code"));
    assert_eq!(request.param("code"), Some("code-1"));
    assert_eq!(request.param("code_verifier"), Some("verifier-1"));
}

#[tokio::test]
async fn test_exchange_code_without_refresh_token_fails() {
    let transport = Arc::new(ScriptedTransport::new(|_| ok(token_body("user-token"))));
    let (tokens, _, _) = store(transport);

    let err = tokens.exchange_code("code-1", "verifier-1").await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
}

#[tokio::test]
async fn test_client_token_is_not_retried_during_cooldown() {
    let transport = Arc::new(ScriptedTransport::new(|_| too_many_requests(Some(600))));
    let (tokens, clock, cache) = store(transport.clone());

    let err = tokens.get_client_access_token().await.unwrap_err();

    assert!(matches!(err, Error::RateLimitExceeded { retry_after: 600 }));
    // One grant, no pause between attempts
    assert_eq!(transport.requests().len(), 1);
    assert!(clock.sleeps().is_empty());
    assert!(cache.get(CLIENT_TOKEN_KEY, clock.now()).await.unwrap().is_none());
}
