use tracing::{error, info, warn};

use crate::{
    error::{Error, Result},
    sync::CatalogSync,
    types::{FollowSyncReport, User},
    utils,
};

impl CatalogSync {
    /// Makes the user's followings exactly the live follow list.
    ///
    /// The follow list is paged with the `after` cursor until it comes back
    /// empty. Excluded artists are left out; every other artist is created
    /// when missing and has its genre set reconciled from the same payload.
    /// A refresh token rotated by the token endpoint is stored on the user.
    pub async fn sync_followed_artists(&self, user: &User) -> Result<FollowSyncReport> {
        let token = self.tokens.get_user_access_token(user).await?;
        if let Some(rotated) = &token.refresh_token {
            self.catalog.update_refresh_token(user.id, rotated).await?;
            info!(user_id = user.id, "stored rotated refresh token");
        }

        let mut artist_ids = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let page = self.api.followed_artists(&token, after.as_deref()).await?;

            for artist in &page.items {
                if self.filter.is_artist_excluded(&artist.id) {
                    continue;
                }
                match self.update_artist_genres(artist).await {
                    Ok(id) => artist_ids.push(id),
                    Err(e) => {
                        error!(
                            method = "sync_followed_artists",
                            user_id = user.id,
                            artist_spotify_id = %artist.id,
                            error = %e,
                            "failed to store followed artist"
                        );
                        // Still followed upstream; a stored row must not be detached
                        if let Ok(Some(stored)) =
                            self.catalog.artist_by_spotify_id(&artist.id).await
                        {
                            artist_ids.push(stored.id);
                        }
                    }
                }
            }

            match page.after() {
                Some(cursor) if !page.items.is_empty() => after = Some(cursor.to_string()),
                _ => break,
            }
        }

        let artist_ids = utils::dedup_preserving_order(&artist_ids);
        let followings = self.catalog.sync_followings(user.id, &artist_ids).await?;
        info!(
            method = "sync_followed_artists",
            user_id = user.id,
            followed = artist_ids.len(),
            attached = followings.attached,
            detached = followings.detached,
            "followings synced"
        );

        Ok(FollowSyncReport {
            followed: artist_ids.len(),
            followings,
        })
    }

    /// Runs [`CatalogSync::sync_followed_artists`] for every stored user and
    /// returns how many were synced.
    ///
    /// Users whose refresh token is rejected are skipped; a rate limit
    /// cooldown or exhausted retries end the run.
    pub async fn sync_all_followed_artists(&self) -> Result<usize> {
        let mut synced = 0;
        for user in self.catalog.users().await? {
            match self.sync_followed_artists(&user).await {
                Ok(_) => synced += 1,
                Err(e @ Error::Auth { .. }) => warn!(
                    method = "sync_all_followed_artists",
                    user_id = user.id,
                    error = %e,
                    "skipping user"
                ),
                Err(e) if e.is_unit_fatal() => return Err(e),
                Err(e) => error!(
                    method = "sync_all_followed_artists",
                    user_id = user.id,
                    error = %e,
                    "follow list sync failed"
                ),
            }
        }
        Ok(synced)
    }
}
