//! Startup blocklist download.

use super::BlockingEngine;
use anyhow::{Context, Result};
use futures::{stream, StreamExt};
use reqwest::Client;
use tracing::{error, info};

/// Downloads each `(name, url)` source and bulk-loads it into the engine.
///
/// Downloads run with at most `concurrency` in flight. A source that fails to
/// fetch contributes nothing and is logged; the remaining sources still load.
pub async fn load_blocklists(
    engine: &BlockingEngine,
    sources: &[(String, String)],
    concurrency: usize,
) -> Result<()> {
    let client = Client::builder()
        .user_agent(concat!("nullzone/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build blocklist HTTP client")?;

    let bodies: Vec<(String, Option<String>)> = stream::iter(sources.iter().cloned())
        .map(|(name, url)| {
            let client = client.clone();
            async move {
                info!("Fetching blocklist [{}] from {}", name, url);
                let body = fetch_source(&client, &url).await;
                if let Err(e) = &body {
                    error!("Failed to fetch blocklist [{}] from {}: {}", name, url, e);
                }
                (name, body.ok())
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    for (name, body) in bodies {
        if let Some(text) = body {
            let count = engine.load_hosts(&text, &name);
            info!("Blocklist [{}] loaded: {} domains", name, count);
        }
    }

    Ok(())
}

async fn fetch_source(client: &Client, url: &str) -> Result<String> {
    let resp = client.get(url).send().await?.error_for_status()?;
    Ok(resp.text().await?)
}
