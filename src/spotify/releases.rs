use crate::{
    error::Result,
    spotify::{SpotifyApi, api::PAGE_LIMIT},
    types::{AlbumPage, FullAlbum, SearchAlbumsResponse, SeveralAlbumsResponse, Token},
};

/// Highest offset the search endpoint serves (1000 results in pages of 50).
pub const SEARCH_MAX_OFFSET: u32 = 950;

impl SpotifyApi {
    /// Searches albums carrying a search tag (`new`, `hipster`) in a market.
    ///
    /// The endpoint caps deep pagination at 1000 results, so `offset` must
    /// not exceed [`SEARCH_MAX_OFFSET`].
    pub async fn search_new_releases(
        &self,
        token: &Token,
        tag: &str,
        market: &str,
        offset: u32,
    ) -> Result<AlbumPage> {
        let query = format!("tag:{tag}");
        let limit = PAGE_LIMIT.to_string();
        let offset = offset.to_string();
        let response: SearchAlbumsResponse = self
            .get(
                token,
                "/search",
                &[
                    ("q", query.as_str()),
                    ("type", "album"),
                    ("limit", limit.as_str()),
                    ("market", market),
                    ("offset", offset.as_str()),
                ],
            )
            .await?;
        Ok(response.albums)
    }

    pub async fn album(&self, token: &Token, album_id: &str) -> Result<FullAlbum> {
        self.get(token, &format!("/albums/{album_id}"), &[]).await
    }

    /// Looks up several albums at once. Unknown ids come back as `None`.
    /// The caller is responsible for keeping `ids` within the upstream limit.
    pub async fn several_albums(
        &self,
        token: &Token,
        ids: &[String],
    ) -> Result<Vec<Option<FullAlbum>>> {
        let ids = ids.join(",");
        let response: SeveralAlbumsResponse =
            self.get(token, "/albums", &[("ids", ids.as_str())]).await?;
        Ok(response.albums)
    }
}
