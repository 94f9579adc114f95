mod common;

use std::{sync::Arc, time::Duration};

use common::*;
use reqwest::Method;
use serde_json::{Value, json};
use sporlsync::{
    Error,
    clock::Clock,
    management::{SharedCache, SqliteCache, SqliteCatalog},
    spotify::{COOLDOWN_KEY, RateLimitedClient, RequestLimits},
};

const URL: &str = "https://api.test/v1/markets";

async fn get(client: &RateLimitedClient) -> sporlsync::Result<Value> {
    client.request(Method::GET, URL, &[], &[]).await
}

#[tokio::test]
async fn test_requests_within_budget_never_sleep() {
    let transport = Arc::new(ScriptedTransport::new(|_| ok(json!({ "markets": [] }))));
    let (client, clock, _) = client_with(transport.clone(), 3, 30);

    for _ in 0..3 {
        get(&client).await.unwrap();
    }

    assert!(clock.sleeps().is_empty());
    assert_eq!(transport.requests().len(), 3);
}

#[tokio::test]
async fn test_request_over_budget_sleeps_until_window_resets() {
    let transport = Arc::new(ScriptedTransport::new(|_| ok(json!({}))));
    let (client, clock, _) = client_with(transport.clone(), 3, 30);

    for _ in 0..4 {
        get(&client).await.unwrap();
    }

    // Only the fourth request waits, and for the rest of the window
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(30)]);
    assert_eq!(transport.requests().len(), 4);
}

#[tokio::test]
async fn test_short_retry_after_sleeps_one_second_longer() {
    let transport = Arc::new(ScriptedTransport::queue(vec![
        too_many_requests(Some(30)),
        ok(json!({ "markets": ["DE"] })),
    ]));
    let (client, clock, _) = client_with(transport.clone(), 100, 30);

    let body = get(&client).await.unwrap();

    assert_eq!(body, json!({ "markets": ["DE"] }));
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(31)]);
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn test_missing_retry_after_sleeps_one_second() {
    let transport = Arc::new(ScriptedTransport::queue(vec![
        too_many_requests(None),
        ok(json!({})),
    ]));
    let (client, clock, _) = client_with(transport, 100, 30);

    get(&client).await.unwrap();

    assert_eq!(clock.sleeps(), vec![Duration::from_secs(1)]);
}

#[tokio::test]
async fn test_long_retry_after_sets_cooldown_without_sleeping() {
    let transport = Arc::new(ScriptedTransport::queue(vec![too_many_requests(Some(120))]));
    let (client, clock, cache) = client_with(transport.clone(), 100, 30);

    let err = get(&client).await.unwrap_err();

    assert!(matches!(err, Error::RateLimitExceeded { retry_after: 120 }));
    assert!(err.is_unit_fatal());
    assert!(clock.sleeps().is_empty());
    assert_eq!(transport.requests().len(), 1);

    let marker = cache.get(COOLDOWN_KEY, clock.now()).await.unwrap();
    let expected = fixed_now().timestamp() + 120;
    assert_eq!(marker, Some(expected.to_string()));

    assert!(!client.are_requests_available().await.unwrap());
    clock.advance(Duration::from_secs(120));
    assert!(!client.are_requests_available().await.unwrap());
    clock.advance(Duration::from_secs(1));
    assert!(client.are_requests_available().await.unwrap());
}

#[tokio::test]
async fn test_huge_retry_after_keeps_cooldown_running() {
    for retry_after in [u64::MAX, i64::MAX as u64] {
        let transport = Arc::new(ScriptedTransport::queue(vec![too_many_requests(Some(
            retry_after,
        ))]));
        let (client, clock, cache) = client_with(transport, 100, 30);

        let err = get(&client).await.unwrap_err();

        assert!(matches!(err, Error::RateLimitExceeded { .. }));
        // Clamped, never wrapped into the past
        let marker = cache.get(COOLDOWN_KEY, clock.now()).await.unwrap();
        assert_eq!(marker, Some(i64::MAX.to_string()));
        assert!(!client.are_requests_available().await.unwrap());
    }
}

#[tokio::test]
async fn test_requests_available_without_cooldown() {
    let transport = Arc::new(ScriptedTransport::new(|_| ok(json!({}))));
    let (client, _, _) = client_with(transport, 100, 30);

    assert!(client.are_requests_available().await.unwrap());
}

#[tokio::test]
async fn test_retries_exhausted_after_three_throttled_attempts() {
    let transport = Arc::new(ScriptedTransport::new(|_| too_many_requests(Some(1))));
    let (client, clock, _) = client_with(transport.clone(), 100, 30);

    let err = get(&client).await.unwrap_err();

    match err {
        Error::RetryExhausted { method, url } => {
            assert_eq!(method, "GET");
            assert_eq!(url, URL);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.requests().len(), 3);
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(2); 3]);
}

#[tokio::test]
async fn test_other_status_fails_without_retry() {
    let transport = Arc::new(ScriptedTransport::new(|_| status(500, "boom")));
    let (client, clock, _) = client_with(transport.clone(), 100, 30);

    let err = get(&client).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(!err.is_unit_fatal());
    match err {
        Error::Upstream { body, method, .. } => {
            assert_eq!(body, "boom");
            assert_eq!(method, "GET");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(transport.requests().len(), 1);
    assert!(clock.sleeps().is_empty());
}

#[tokio::test]
async fn test_unreadable_body_is_a_decode_error() {
    let transport = Arc::new(ScriptedTransport::new(|_| status(200, "not json")));
    let (client, _, _) = client_with(transport, 100, 30);

    let err = get(&client).await.unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
}

#[tokio::test]
async fn test_params_and_headers_reach_the_transport() {
    let transport = Arc::new(ScriptedTransport::new(|_| ok(json!({}))));
    let (client, _, _) = client_with(transport.clone(), 100, 30);

    let _: Value = client
        .request(
            Method::GET,
            URL,
            &[("limit", "50")],
            &[("Authorization", "Bearer abc")],
        )
        .await
        .unwrap();

    let request = &transport.requests()[0];
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.param("limit"), Some("50"));
    assert_eq!(request.header("authorization"), Some("Bearer abc"));
}

#[tokio::test]
async fn test_budget_is_shared_between_clients_on_one_store() {
    let catalog = SqliteCatalog::in_memory().await.unwrap();
    let cache = Arc::new(SqliteCache::new(catalog.pool().clone()).await.unwrap());
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let transport = Arc::new(ScriptedTransport::new(|_| ok(json!({}))));
    let limits = RequestLimits {
        attempts: 2,
        decay: Duration::from_secs(30),
    };

    let first = RateLimitedClient::new(transport.clone(), cache.clone(), clock.clone(), limits);
    let second = RateLimitedClient::new(transport.clone(), cache.clone(), clock.clone(), limits);

    get(&first).await.unwrap();
    get(&first).await.unwrap();
    assert!(clock.sleeps().is_empty());

    // The second unit finds the window already used up
    get(&second).await.unwrap();
    assert_eq!(clock.sleeps(), vec![Duration::from_secs(30)]);
}

#[tokio::test]
async fn test_cooldown_is_visible_to_other_clients() {
    let catalog = SqliteCatalog::in_memory().await.unwrap();
    let cache = Arc::new(SqliteCache::new(catalog.pool().clone()).await.unwrap());
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let limits = RequestLimits {
        attempts: 100,
        decay: Duration::from_secs(30),
    };

    let throttled = Arc::new(ScriptedTransport::queue(vec![too_many_requests(Some(600))]));
    let first = RateLimitedClient::new(throttled, cache.clone(), clock.clone(), limits);
    let idle = Arc::new(ScriptedTransport::new(|_| ok(json!({}))));
    let second = RateLimitedClient::new(idle, cache.clone(), clock.clone(), limits);

    assert!(get(&first).await.is_err());
    assert!(!second.are_requests_available().await.unwrap());
}
