use crate::{
    cli::{Context, spinner},
    error::{Error, Result},
    success,
    types::DiscoveryReport,
    warning,
};

/// Sweeps the new release search.
///
/// Without `markets` every configured market that Spotify currently serves
/// is swept; without `tags` the configured search tags are used.
pub async fn releases(context: &Context, tags: Vec<String>, markets: Vec<String>) -> Result<()> {
    if !context.sync.are_requests_available().await? {
        warning!("Requests are cooling down. Try again later.");
        return Ok(());
    }

    let tags = if tags.is_empty() {
        context.settings.search_tags.clone()
    } else {
        tags
    };

    let pb = spinner("Searching new releases...");
    let report = if markets.is_empty() {
        context.sync.add_new_releases_for_markets(&tags).await
    } else {
        sweep(context, &tags, &markets, |market, tag| {
            pb.set_message(format!("Searching new releases tagged {tag} in {market}..."))
        })
        .await
    };
    pb.finish_and_clear();

    let report = report?;
    success!(
        "Scanned {} albums, accepted {}, stored {}.",
        report.scanned,
        report.accepted,
        report.saved
    );
    Ok(())
}

async fn sweep(
    context: &Context,
    tags: &[String],
    markets: &[String],
    progress: impl Fn(&str, &str),
) -> Result<DiscoveryReport> {
    let mut report = DiscoveryReport::default();
    for market in markets {
        for tag in tags {
            progress(market, tag);
            match context.sync.add_new_releases(tag, market).await {
                Ok(r) => report.merge(r),
                Err(e @ Error::RateLimitExceeded { .. }) => return Err(e),
                Err(e) => warning!("Sweep of {} / {} failed: {}", market, tag, e),
            }
        }
    }
    Ok(report)
}

/// Re-fetches every stored album and writes back changed fields.
pub async fn refresh_albums(context: &Context) -> Result<()> {
    if !context.sync.are_requests_available().await? {
        warning!("Requests are cooling down. Try again later.");
        return Ok(());
    }

    let pb = spinner("Refreshing albums...");
    let report = context.sync.refresh_catalog_albums().await;
    pb.finish_and_clear();

    let report = report?;
    success!(
        "Updated {} albums, deleted {} compilations, {} unchanged, {} no longer available.",
        report.updated,
        report.deleted,
        report.unchanged,
        report.missing
    );
    Ok(())
}
