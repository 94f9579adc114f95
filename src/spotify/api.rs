use std::sync::Arc;

use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::{error::Result, spotify::RateLimitedClient, types::Token};

/// Page size used by every paginated endpoint.
pub const PAGE_LIMIT: u32 = 50;

/// Typed access to the Web API endpoints the sync jobs need.
///
/// The endpoint methods live next to their domain in `artists`, `releases`
/// and `profile`; this type only carries the client and the base URL.
#[derive(Clone)]
pub struct SpotifyApi {
    client: Arc<RateLimitedClient>,
    api_url: String,
}

impl SpotifyApi {
    pub fn new(client: Arc<RateLimitedClient>, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn client(&self) -> &Arc<RateLimitedClient> {
        &self.client
    }

    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        token: &Token,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}{}", self.api_url, path);
        let authorization = format!("Bearer {}", token.value);
        self.client
            .request(
                Method::GET,
                &url,
                params,
                &[("Authorization", authorization.as_str())],
            )
            .await
    }
}
