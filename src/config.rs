// src/config.rs

//! Manages server configuration: loading, defaults and validation.

use crate::core::cluster::redirect::parse_slot_range;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;
use tracing::warn;

/// Settings for the `WATCH`/`MULTI`/`PREPARE`/`EXEC` machinery.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TransactionConfig {
    /// When false every transaction command fails with `ERR tx command disable`.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of independently locked shards of the watch-key registry.
    #[serde(default = "default_tx_shards")]
    pub shards: usize,
    /// Maximum number of transactions between `MULTI` and their end.
    #[serde(default = "default_parallel_limit")]
    pub parallel_limit: usize,
    /// How long a prepared transaction may hold its locks before the watchdog
    /// releases them.
    #[serde(with = "humantime_serde", default = "default_prepare_timeout")]
    pub prepare_timeout: Duration,
    #[serde(default = "default_lock_attempts")]
    pub lock_attempts: u32,
    #[serde(with = "humantime_serde", default = "default_lock_retry_backoff")]
    pub lock_retry_backoff: Duration,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            shards: default_tx_shards(),
            parallel_limit: default_parallel_limit(),
            prepare_timeout: default_prepare_timeout(),
            lock_attempts: default_lock_attempts(),
            lock_retry_backoff: default_lock_retry_backoff(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_tx_shards() -> usize {
    200
}
fn default_parallel_limit() -> usize {
    200
}
fn default_prepare_timeout() -> Duration {
    Duration::from_secs(3)
}
fn default_lock_attempts() -> u32 {
    3
}
fn default_lock_retry_backoff() -> Duration {
    Duration::from_millis(1)
}

/// Slot ownership. When disabled every key is served locally.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClusterConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Inclusive slot ranges such as `"0-8191"` or a single `"42"`.
    #[serde(default = "default_owned_slots")]
    pub owned_slots: Vec<String>,
    /// The address reported in `MOVED` replies.
    #[serde(default)]
    pub redirect_addr: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            owned_slots: default_owned_slots(),
            redirect_addr: String::new(),
        }
    }
}

fn default_owned_slots() -> Vec<String> {
    vec!["0-16383".to_string()]
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReplicationConfig {
    /// Routes writes through the in-process replication log before applying them.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            log_capacity: default_log_capacity(),
        }
    }
}

fn default_log_capacity() -> usize {
    10_000
}

/// Configuration for the Prometheus metrics exporter.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MetricsConfig {
    /// If true, an HTTP server will be started to expose Prometheus metrics.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    8878
}

/// Mirrors the TOML file. Missing keys take their `default_*` value.
#[derive(Deserialize)]
struct RawConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_log_level")]
    log_level: String,
    #[serde(default = "default_max_clients")]
    max_clients: usize,
    #[serde(with = "humantime_serde", default = "default_keepalive")]
    keepalive: Duration,
    #[serde(with = "humantime_serde", default = "default_slow_time")]
    slow_time: Duration,
    #[serde(default = "default_slowlog_max_len")]
    slowlog_max_len: usize,
    #[serde(default)]
    transaction: TransactionConfig,
    #[serde(default)]
    cluster: ClusterConfig,
    #[serde(default)]
    replication: ReplicationConfig,
    #[serde(default)]
    metrics: MetricsConfig,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7878
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_max_clients() -> usize {
    10000
}
fn default_keepalive() -> Duration {
    Duration::from_secs(3600)
}
fn default_slow_time() -> Duration {
    Duration::from_millis(30)
}
fn default_slowlog_max_len() -> usize {
    128
}

/// The validated server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub max_clients: usize,
    /// Read deadline per connection. Zero disables it.
    #[serde(with = "humantime_serde")]
    pub keepalive: Duration,
    /// Requests taking at least this long are reported as slow.
    #[serde(with = "humantime_serde")]
    pub slow_time: Duration,
    pub slowlog_max_len: usize,
    pub transaction: TransactionConfig,
    pub cluster: ClusterConfig,
    pub replication: ReplicationConfig,
    pub metrics: MetricsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            max_clients: default_max_clients(),
            keepalive: default_keepalive(),
            slow_time: default_slow_time(),
            slowlog_max_len: default_slowlog_max_len(),
            transaction: TransactionConfig::default(),
            cluster: ClusterConfig::default(),
            replication: ReplicationConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl From<RawConfig> for Config {
    fn from(raw: RawConfig) -> Self {
        Self {
            host: raw.host,
            port: raw.port,
            log_level: raw.log_level,
            max_clients: raw.max_clients,
            keepalive: raw.keepalive,
            slow_time: raw.slow_time,
            slowlog_max_len: raw.slowlog_max_len,
            transaction: raw.transaction,
            cluster: raw.cluster,
            replication: raw.replication,
            metrics: raw.metrics,
        }
    }
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file '{path}'"))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let raw: RawConfig = toml::from_str(contents).context("Failed to parse TOML")?;
        let config = Config::from(raw);
        config.validate()?;
        Ok(config)
    }

    /// Checks the configuration for logical consistency.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow!("port cannot be 0"));
        }
        if self.host.trim().is_empty() {
            return Err(anyhow!("host cannot be empty"));
        }
        if self.max_clients == 0 {
            return Err(anyhow!("max_clients cannot be 0"));
        }
        if self.slowlog_max_len == 0 {
            warn!("slowlog_max_len is 0; the slow log will stay empty");
        }

        let tx = &self.transaction;
        if tx.shards == 0 {
            return Err(anyhow!("transaction.shards cannot be 0"));
        }
        if tx.lock_attempts == 0 {
            return Err(anyhow!("transaction.lock_attempts cannot be 0"));
        }
        if tx.prepare_timeout.is_zero() {
            return Err(anyhow!("transaction.prepare_timeout cannot be 0"));
        }
        if tx.enabled && tx.parallel_limit == 0 {
            warn!("transaction.parallel_limit is 0; every MULTI will be rejected");
        }

        for range in &self.cluster.owned_slots {
            parse_slot_range(range)
                .map_err(|e| anyhow!("invalid cluster.owned_slots entry '{range}': {e}"))?;
        }
        if self.cluster.enabled && self.cluster.redirect_addr.trim().is_empty() {
            return Err(anyhow!(
                "cluster.redirect_addr cannot be empty when cluster is enabled"
            ));
        }

        if self.metrics.enabled {
            if self.metrics.port == 0 {
                return Err(anyhow!("metrics.port cannot be 0"));
            }
            if self.metrics.port == self.port {
                return Err(anyhow!(
                    "metrics.port cannot be the same as the main server port"
                ));
            }
        }
        Ok(())
    }
}
