use chrono::{TimeZone, Utc};
use tabled::Table;

use crate::{
    cli::Context,
    error::Result,
    info,
    management::{Catalog, SharedCache},
    spotify::COOLDOWN_KEY,
    types::CountTableRow,
    warning,
};

/// Prints row counts of the catalog and whether requests are cooling down.
pub async fn info(context: &Context) -> Result<()> {
    let counts = context.catalog.counts().await?;
    let rows = vec![
        CountTableRow {
            entity: "users".into(),
            rows: counts.users,
        },
        CountTableRow {
            entity: "artists".into(),
            rows: counts.artists,
        },
        CountTableRow {
            entity: "albums".into(),
            rows: counts.albums,
        },
        CountTableRow {
            entity: "genres".into(),
            rows: counts.genres,
        },
        CountTableRow {
            entity: "followings".into(),
            rows: counts.followings,
        },
    ];
    println!("{}", Table::new(rows));

    if context.client.are_requests_available().await? {
        info!("Requests are available.");
        return Ok(());
    }

    let until = context
        .client
        .cache()
        .get(COOLDOWN_KEY, Utc::now())
        .await?
        .and_then(|v| v.parse::<i64>().ok())
        .and_then(|ts| Utc.timestamp_opt(ts, 0).single());
    match until {
        Some(until) => warning!("Requests are cooling down until {}.", until.to_rfc3339()),
        None => warning!("Requests are cooling down."),
    }
    Ok(())
}
