use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;

use nullzone::cache::ResponseCache;
use nullzone::config::Config;
use nullzone::engine::{load_blocklists, BlockingEngine, BlocklistAdmin};
use nullzone::observer::{ClientActivity, QueryNotifier, RecentQueries};
use nullzone::server::{DnsHandler, DnsListener, QueryProcessor};
use nullzone::stats::Metrics;
use nullzone::upstream::RoundRobinPool;

#[tokio::main]
async fn main() -> Result<()> {
    // Load config before logging init to get the level.
    let config_path = std::env::args().nth(1).unwrap_or("config.toml".to_string());
    let config_exists = std::path::Path::new(&config_path).exists();
    let config = if config_exists {
        Config::load(&config_path).await?
    } else {
        Config::default()
    };

    setup_logging(&config);
    info!("Starting nullzone...");
    if !config_exists {
        info!("Config file not found, using defaults.");
    }

    // Metrics and the observability channel.
    let metrics = Metrics::new();
    metrics.clone().spawn_dump_task(config.stats_interval_seconds);

    let notifier = Arc::new(QueryNotifier::new());
    let recent = Arc::new(RecentQueries::new(config.recent_queries));
    let clients = Arc::new(ClientActivity::new());
    notifier.register_query_observer(recent.clone());
    notifier.register_query_observer(clients.clone());

    // Blocking engine: config whitelist/patterns first, then list downloads.
    let engine = Arc::new(BlockingEngine::new());
    for domain in &config.whitelist {
        engine.add_whitelist(domain);
    }
    for pattern in &config.block_patterns {
        engine
            .add_regex(pattern)
            .context("Rejecting configured block pattern")?;
    }

    info!("Loading blocklists...");
    load_blocklists(
        &engine,
        &config.blocklists_sorted(),
        config.concurrent_downloads,
    )
    .await?;
    for (name, stats) in engine.blocklist_stats() {
        info!("Blocklist {}: {} domains", name, stats.domains);
    }

    // Resolver pipeline.
    let cache = Arc::new(ResponseCache::new(
        config.cache_size,
        Duration::from_secs(config.cache_ttl_seconds),
    ));
    let upstream = Arc::new(RoundRobinPool::new(
        config.upstream_endpoints()?,
        Duration::from_millis(config.upstream_timeout_ms),
    )?);
    info!("Upstream servers: {:?}", config.upstream_servers);

    let processor = Arc::new(QueryProcessor::new(
        engine.clone(),
        cache,
        upstream,
        metrics.clone(),
        notifier.clone(),
        config.sink_addr()?,
    ));
    let handler = DnsHandler::new(processor, metrics.clone());

    // Bind is the readiness gate: returns once the socket accepts datagrams.
    let mut listener = DnsListener::bind(config.bind_addr()?, handler).await?;
    info!("nullzone is running on {}. Press Ctrl+C to stop.", listener.local_addr());

    tokio::select! {
        result = listener.serve() => {
            result?;
        }
        _ = signal::ctrl_c() => {
            info!("Shutdown signal received.");
        }
    }

    listener
        .shutdown(Duration::from_secs(config.shutdown_timeout_seconds))
        .await?;
    info!("Shutdown complete.");
    Ok(())
}

/// Sets up the tracing subscriber with the configured filters.
fn setup_logging(config: &Config) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let mut filter = config.logging.level.clone();

        // Suppress hickory_server logs unless explicitly enabled/overridden
        if !filter.contains("hickory_server") {
            filter.push_str(",hickory_server=off");
        }
        // Also suppress hickory_proto if not set
        if !filter.contains("hickory_proto") {
            filter.push_str(",hickory_proto=off");
        }

        tracing_subscriber::EnvFilter::new(filter)
    });

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
