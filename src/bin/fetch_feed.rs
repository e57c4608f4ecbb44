// src/bin/fetch_feed.rs
//! Fetch one feed and print what survives validation.
//!
//! Usage: `fetch_feed <feed_url> [max_items]`

use std::time::Duration;

use anyhow::{bail, Context, Result};
use feed_fetcher::{CallContext, FeedFetcher, FetchConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("feed_fetcher=debug,info")),
        )
        .with_target(false)
        .init();

    let mut args = std::env::args().skip(1);
    let Some(feed_url) = args.next() else {
        bail!("usage: fetch_feed <feed_url> [max_items]");
    };

    let mut config = FetchConfig::load_default()?
        .with_max_age(Duration::from_secs(7 * 24 * 3600))
        .with_request_timeout(Duration::from_secs(15));
    if let Some(raw) = args.next() {
        let max: i64 = raw.parse().with_context(|| format!("invalid max_items: {raw}"))?;
        config = config.with_max_items(max);
    }

    let fetcher = FeedFetcher::http(config).with_component("fetch_feed");

    // Ctrl-C cancels the in-flight fetch.
    let ctx = CallContext::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let items = fetcher
        .fetch_and_process(&feed_url, &ctx)
        .await
        .with_context(|| format!("fetching {feed_url}"))?;

    tracing::info!(count = items.len(), "fetched items");
    for (i, item) in items.iter().enumerate() {
        tracing::info!(
            n = i + 1,
            headline = item.headline(),
            url = item.url(),
            published = %item.published_at(),
            "item"
        );
    }

    if let Some(first) = items.first() {
        println!("{}", serde_json::to_string_pretty(first)?);
    }
    Ok(())
}
