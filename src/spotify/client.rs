use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode, header::RETRY_AFTER};
use serde::de::DeserializeOwned;
use tracing::{error, info};

use crate::{
    clock::Clock,
    error::{Error, Result},
    management::{Budget, SharedCache},
};

/// Outer attempts per request before giving up with `RetryExhausted`.
pub const MAX_ATTEMPTS: u32 = 3;
/// Longest `Retry-After` we are willing to sleep through.
pub const MAX_RETRY_AFTER: u64 = 60;

pub const REQUEST_BUDGET_KEY: &str = "spotify-request";
pub const COOLDOWN_KEY: &str = "spotify-requests-available-since";

/// Shared request budget: at most `attempts` requests per `decay` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    pub attempts: u32,
    pub decay: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    /// Query string for GET, form body for POST.
    pub params: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, when present and numeric.
    pub retry_after: Option<u64>,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one HTTP request without any retry or budgeting.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse>;
}

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        builder = if request.method == Method::GET {
            builder.query(&request.params)
        } else {
            builder.form(&request.params)
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await?;

        Ok(ApiResponse {
            status,
            retry_after,
            body,
        })
    }
}

/// HTTP client that shares one request budget between every running unit
/// and reacts to the Web API's 429 backoff hints.
pub struct RateLimitedClient {
    transport: Arc<dyn Transport>,
    cache: Arc<dyn SharedCache>,
    clock: Arc<dyn Clock>,
    limits: RequestLimits,
}

impl RateLimitedClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<dyn SharedCache>,
        clock: Arc<dyn Clock>,
        limits: RequestLimits,
    ) -> Self {
        Self {
            transport,
            cache,
            clock,
            limits,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn cache(&self) -> &Arc<dyn SharedCache> {
        &self.cache
    }

    /// Sends a request and decodes a successful body into `T`.
    ///
    /// Each of the [`MAX_ATTEMPTS`] outer attempts first claims a slot of the
    /// shared budget, sleeping until the window resets when it is full. A 429
    /// with `Retry-After` up to [`MAX_RETRY_AFTER`] seconds sleeps
    /// `Retry-After + 1` seconds and moves on to the next attempt; a longer
    /// one records the cooldown marker and fails with `RateLimitExceeded`.
    /// Any other non-2xx status fails immediately with `Upstream`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        params: &[(&str, &str)],
        headers: &[(&str, &str)],
    ) -> Result<T> {
        let request = ApiRequest {
            method,
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };

        for _ in 0..MAX_ATTEMPTS {
            self.acquire_slot().await?;

            let response = self.transport.send(&request).await?;
            if response.is_success() {
                return Ok(serde_json::from_str(&response.body)?);
            }

            error!(
                status = response.status,
                method = %request.method,
                url = %request.url,
                "spotify request failed"
            );

            if response.status != StatusCode::TOO_MANY_REQUESTS.as_u16() {
                return Err(Error::Upstream {
                    status: response.status,
                    method: request.method.to_string(),
                    url: request.url.clone(),
                    body: response.body,
                });
            }

            let retry_after = response.retry_after.unwrap_or(0);
            info!(retry_after, url = %request.url, "spotify asked to back off");
            if retry_after <= MAX_RETRY_AFTER {
                self.clock.sleep(Duration::from_secs(retry_after + 1)).await;
            } else {
                let available_since = self
                    .clock
                    .now()
                    .timestamp()
                    .saturating_add(i64::try_from(retry_after).unwrap_or(i64::MAX));
                self.cache
                    .put(COOLDOWN_KEY, &available_since.to_string(), None)
                    .await?;
                return Err(Error::RateLimitExceeded { retry_after });
            }
        }

        Err(Error::RetryExhausted {
            method: request.method.to_string(),
            url: request.url,
        })
    }

    /// False while a cooldown recorded by an oversized `Retry-After` is
    /// still running. Bulk jobs check this before starting.
    pub async fn are_requests_available(&self) -> Result<bool> {
        let now = self.clock.now();
        let available_since = self
            .cache
            .get(COOLDOWN_KEY, now)
            .await?
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(0);
        Ok(now.timestamp() > available_since)
    }

    async fn acquire_slot(&self) -> Result<()> {
        loop {
            let budget = self
                .cache
                .hit(
                    REQUEST_BUDGET_KEY,
                    self.limits.attempts,
                    self.limits.decay,
                    self.clock.now(),
                )
                .await?;

            match budget {
                Budget::Granted => return Ok(()),
                Budget::Exhausted { available_in } => {
                    info!(
                        seconds = available_in.as_secs(),
                        "rate limiter sleep"
                    );
                    self.clock.sleep(available_in).await;
                }
            }
        }
    }
}
