//! Configuration module for `nullzone`.
//!
//! Defines the startup configuration record and its validation. Uses `serde`
//! for deserialization and `toml` for the file format; every field carries a
//! default so a missing or partial file still yields a runnable server.
//!
//! # Example Config
//! ```toml
//! host = "0.0.0.0"
//! dns_port = 5353
//! upstream_servers = ["9.9.9.9:53"]
//!
//! [blocklists]
//! stevenblack = "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts"
//! ```

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use tokio::fs;

/// Main configuration struct holding all settings for the DNS server.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    /// The IP address to bind the DNS server to (e.g., "0.0.0.0").
    #[serde(default = "default_host")]
    pub host: String,

    /// The UDP port to serve DNS on.
    #[serde(default = "default_dns_port")]
    pub dns_port: u16,

    /// The port reserved for the management/dashboard HTTP surface.
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Upstream resolvers as "host:port", tried round-robin with failover.
    #[serde(default = "default_upstream_servers")]
    pub upstream_servers: Vec<String>,

    /// Per-try timeout in milliseconds for one upstream exchange.
    #[serde(default = "default_upstream_timeout_ms")]
    pub upstream_timeout_ms: u64,

    /// How blocked names are answered. Only "zero_ip" is supported.
    #[serde(default = "default_blocking_mode")]
    pub blocking_mode: String,

    /// The IPv4 sink address returned for blocked A questions.
    #[serde(default = "default_blocking_ip")]
    pub blocking_ip: String,

    /// Maximum number of cached responses.
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,

    /// Uniform lifetime in seconds applied to every cached response.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// Map of blocklist names to their hosts-file URLs.
    #[serde(default = "default_blocklists")]
    pub blocklists: HashMap<String, String>,

    /// Domains that are never blocked, regardless of lists or patterns.
    #[serde(default)]
    pub whitelist: Vec<String>,

    /// Regex patterns blocked after exact/suffix checks miss.
    #[serde(default)]
    pub block_patterns: Vec<String>,

    /// Number of concurrent blocklist downloads on startup.
    #[serde(default = "default_concurrent_downloads")]
    pub concurrent_downloads: usize,

    /// How many recent queries the in-memory log retains.
    #[serde(default = "default_recent_queries")]
    pub recent_queries: usize,

    /// Interval in seconds between stats summary dumps; 0 disables them.
    #[serde(default = "default_stats_interval")]
    pub stats_interval_seconds: u64,

    /// How long graceful shutdown may take before handlers are abandoned.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for diagnostic logging.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "nullzone=debug").
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Defaults
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_dns_port() -> u16 {
    53
}
fn default_http_port() -> u16 {
    8080
}
fn default_upstream_servers() -> Vec<String> {
    vec!["8.8.8.8:53".to_string(), "1.1.1.1:53".to_string()]
}
fn default_upstream_timeout_ms() -> u64 {
    2000
}
fn default_blocking_mode() -> String {
    "zero_ip".to_string()
}
fn default_blocking_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_cache_size() -> usize {
    10000
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_concurrent_downloads() -> usize {
    4
}
fn default_recent_queries() -> usize {
    100
}
fn default_stats_interval() -> u64 {
    300
}
fn default_shutdown_timeout() -> u64 {
    5
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_blocklists() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert(
        "stevenblack".to_string(),
        "https://raw.githubusercontent.com/StevenBlack/hosts/master/hosts".to_string(),
    );
    m.insert(
        "adaway".to_string(),
        "https://adaway.org/hosts.txt".to_string(),
    );
    m
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            dns_port: default_dns_port(),
            http_port: default_http_port(),
            upstream_servers: default_upstream_servers(),
            upstream_timeout_ms: default_upstream_timeout_ms(),
            blocking_mode: default_blocking_mode(),
            blocking_ip: default_blocking_ip(),
            cache_size: default_cache_size(),
            cache_ttl_seconds: default_cache_ttl(),
            blocklists: default_blocklists(),
            whitelist: vec![],
            block_patterns: vec![],
            concurrent_downloads: default_concurrent_downloads(),
            recent_queries: default_recent_queries(),
            stats_interval_seconds: default_stats_interval(),
            shutdown_timeout_seconds: default_shutdown_timeout(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads the configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the TOML does not parse,
    /// or validation rejects a field value.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the request path cannot recover from.
    pub fn validate(&self) -> Result<()> {
        if self.blocking_mode != "zero_ip" {
            bail!("Unsupported blocking_mode '{}'", self.blocking_mode);
        }
        if self.upstream_servers.is_empty() {
            bail!("At least one upstream server is required");
        }
        self.sink_addr()?;
        self.upstream_endpoints()?;
        Ok(())
    }

    /// The IPv4 sink address returned for blocked A questions.
    pub fn sink_addr(&self) -> Result<Ipv4Addr> {
        self.blocking_ip
            .parse()
            .with_context(|| format!("Invalid blocking_ip '{}'", self.blocking_ip))
    }

    /// Parsed upstream endpoints, in configured order.
    pub fn upstream_endpoints(&self) -> Result<Vec<SocketAddr>> {
        self.upstream_servers
            .iter()
            .map(|s| {
                s.parse()
                    .with_context(|| format!("Invalid upstream server '{}'", s))
            })
            .collect()
    }

    /// The DNS bind address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid host '{}'", self.host))?;
        Ok(SocketAddr::new(ip, self.dns_port))
    }

    /// Returns the configured blocklists sorted by name.
    pub fn blocklists_sorted(&self) -> Vec<(String, String)> {
        let mut list: Vec<_> = self
            .blocklists
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        list.sort_by(|a, b| a.0.cmp(&b.0));
        list
    }
}
