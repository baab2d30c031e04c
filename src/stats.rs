use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{self, Duration};
use tracing::info;

/// Process-wide query counters.
///
/// All counters are monotonic and incremented with relaxed ordering; a
/// snapshot reads each counter independently, so the four values are not
/// guaranteed to be mutually consistent under load.
#[derive(Debug, Default)]
pub struct Metrics {
    total_queries: AtomicU64,
    blocked_queries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

/// Point-in-time copy of the counters, shaped for the management surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub blocked_queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Counted once per inbound request, at entry.
    pub fn inc_total(&self) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_blocked(&self) {
        self.blocked_queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            blocked_queries: self.blocked_queries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }

    /// Spawns a background task that logs a summary at the given interval.
    pub fn spawn_dump_task(self: Arc<Self>, interval_secs: u64) {
        if interval_secs == 0 {
            return;
        }
        let metrics = self;
        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(interval_secs));
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                metrics.dump();
            }
        });
    }

    fn dump(&self) {
        let s = self.snapshot();
        let pct = |part: u64| {
            if s.total_queries > 0 {
                (part as f64 / s.total_queries as f64) * 100.0
            } else {
                0.0
            }
        };
        info!(
            "STATS: Total: {}, Blocked: {} ({:.1}%), CacheHits: {} ({:.1}%), CacheMisses: {}",
            s.total_queries,
            s.blocked_queries,
            pct(s.blocked_queries),
            s.cache_hits,
            pct(s.cache_hits),
            s.cache_misses,
        );
    }
}
