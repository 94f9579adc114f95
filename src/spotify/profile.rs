use crate::{
    error::Result,
    spotify::SpotifyApi,
    types::{MarketsResponse, Token, UserProfile},
};

impl SpotifyApi {
    /// Profile of the user owning `token`.
    pub async fn me(&self, token: &Token) -> Result<UserProfile> {
        self.get(token, "/me", &[]).await
    }

    /// Country codes of every market the catalog is available in.
    pub async fn markets(&self, token: &Token) -> Result<Vec<String>> {
        let response: MarketsResponse = self.get(token, "/markets", &[]).await?;
        Ok(response.markets)
    }
}
