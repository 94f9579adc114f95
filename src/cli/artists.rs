use tabled::Table;

use crate::{
    cli::{Context, spinner},
    error::Result,
    success,
    types::CountTableRow,
    warning,
};

/// Reconciles the followings of every stored user.
pub async fn sync_followed(context: &Context) -> Result<()> {
    let pb = spinner("Syncing followed artists...");
    let synced = context.sync.sync_all_followed_artists().await;
    pb.finish_and_clear();

    let synced = synced?;
    if synced == 0 {
        warning!("No user synced. Run sporlsync auth first.");
    } else {
        success!("Synced followed artists of {} users.", synced);
    }
    Ok(())
}

/// Checks the latest album and single of followed artists due for a check.
pub async fn followed_albums(context: &Context, limit: Option<i64>) -> Result<()> {
    if !context.sync.are_requests_available().await? {
        warning!("Requests are cooling down. Try again later.");
        return Ok(());
    }

    let pb = spinner("Checking followed artists for new albums...");
    let report = context.sync.add_followed_artist_albums(limit).await;
    pb.finish_and_clear();

    let report = report?;
    success!(
        "Checked {} releases, accepted {}, stored {} albums.",
        report.scanned,
        report.accepted,
        report.saved
    );
    Ok(())
}

/// Refreshes artists that have no genre yet.
pub async fn missing_genres(context: &Context) -> Result<()> {
    if !context.sync.are_requests_available().await? {
        warning!("Requests are cooling down. Try again later.");
        return Ok(());
    }

    let pb = spinner("Refreshing artists without genres...");
    let refreshed = context.sync.refresh_artists_without_genres().await;
    pb.finish_and_clear();

    success!("Refreshed {} artists.", refreshed?);
    Ok(())
}

pub async fn cleanup(context: &Context) -> Result<()> {
    let report = context.sync.clear_artists().await?;

    let rows = [
        ("artists without followers and albums", report.without_albums),
        ("albums of excluded artists", report.exception_albums),
        ("excluded artists", report.exceptions),
        ("albums of artists without followers and genres", report.without_genres_albums),
        ("artists without followers and genres", report.without_genres),
    ]
    .into_iter()
    .map(|(entity, rows)| CountTableRow {
        entity: entity.to_string(),
        rows: rows as i64,
    });

    println!("{}", Table::new(rows));
    success!("Catalog cleaned.");
    Ok(())
}
