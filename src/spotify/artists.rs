use crate::{
    error::Result,
    spotify::{SpotifyApi, api::PAGE_LIMIT},
    types::{
        AlbumPage, FollowedArtistsPage, FollowedArtistsResponse, FullArtist,
        SeveralArtistsResponse, SimpleAlbum, Token,
    },
};

impl SpotifyApi {
    /// Retrieves one page of the user's followed artists.
    ///
    /// Pagination is cursor based: pass the `after` cursor of the previous
    /// page (see [`FollowedArtistsPage::after`]) until it comes back empty.
    pub async fn followed_artists(
        &self,
        token: &Token,
        after: Option<&str>,
    ) -> Result<FollowedArtistsPage> {
        let limit = PAGE_LIMIT.to_string();
        let mut params = vec![("type", "artist"), ("limit", limit.as_str())];
        if let Some(after) = after {
            params.push(("after", after));
        }

        let response: FollowedArtistsResponse =
            self.get(token, "/me/following", &params).await?;
        Ok(response.artists)
    }

    pub async fn artist(&self, token: &Token, artist_id: &str) -> Result<FullArtist> {
        self.get(token, &format!("/artists/{artist_id}"), &[]).await
    }

    /// Looks up several artists at once. Unknown ids come back as `None`.
    /// The caller is responsible for keeping `ids` within the upstream limit.
    pub async fn several_artists(
        &self,
        token: &Token,
        ids: &[String],
    ) -> Result<Vec<Option<FullArtist>>> {
        let ids = ids.join(",");
        let response: SeveralArtistsResponse =
            self.get(token, "/artists", &[("ids", ids.as_str())]).await?;
        Ok(response.artists)
    }

    /// Lists an artist's releases filtered by release group
    /// (`album`, `single`, `appears_on`, `compilation`).
    pub async fn artist_albums(
        &self,
        token: &Token,
        artist_id: &str,
        include_groups: &str,
        limit: u32,
    ) -> Result<AlbumPage> {
        let limit = limit.to_string();
        self.get(
            token,
            &format!("/artists/{artist_id}/albums"),
            &[("include_groups", include_groups), ("limit", limit.as_str())],
        )
        .await
    }

    /// The artist's most recent album, if any.
    pub async fn last_artist_album(
        &self,
        token: &Token,
        artist_id: &str,
    ) -> Result<Option<SimpleAlbum>> {
        let page = self.artist_albums(token, artist_id, "album", 1).await?;
        Ok(page.items.into_iter().flatten().next())
    }

    /// The artist's most recent single, if any.
    pub async fn last_artist_single(
        &self,
        token: &Token,
        artist_id: &str,
    ) -> Result<Option<SimpleAlbum>> {
        let page = self.artist_albums(token, artist_id, "single", 1).await?;
        Ok(page.items.into_iter().flatten().next())
    }
}
