//! Coordinator configuration module
//!
//! Handles loading configuration from environment variables. The config is
//! built once at startup and handed to every component by reference.

use crate::error::CoordinatorError;
use crate::guilds::StalePartitionPolicy;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default heartbeat timeout and sweep period, in seconds
pub const DEFAULT_LIVENESS_SECS: u64 = 5;

/// Default RPC port (matches the port shards were historically pointed at)
pub const DEFAULT_HTTP_PORT: u16 = 50051;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Number of shard slots, fixed for the lifetime of the process
    pub total_shards: u32,

    /// A shard that has not checked in for longer than this is evicted
    pub heartbeat_timeout: Duration,

    /// How often the liveness monitor sweeps the registry
    pub sweep_period: Duration,

    /// What happens to an evicted shard's guild snapshot
    pub stale_policy: StalePartitionPolicy,

    /// RPC/health/metrics HTTP port
    pub http_port: u16,

    /// NATS server URL(s) - comma-separated for multiple servers
    pub nats_url: Option<String>,

    /// Directory published assets are written under
    pub asset_root: PathBuf,

    /// Public base URL published assets are served from
    pub cdn_base_url: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl CoordinatorConfig {
    /// Config with default timings for `total_shards` slots
    pub fn new(total_shards: u32) -> Self {
        Self {
            total_shards,
            heartbeat_timeout: Duration::from_secs(DEFAULT_LIVENESS_SECS),
            sweep_period: Duration::from_secs(DEFAULT_LIVENESS_SECS),
            stale_policy: StalePartitionPolicy::default(),
            http_port: DEFAULT_HTTP_PORT,
            nats_url: None,
            asset_root: PathBuf::from("/var/www"),
            cdn_base_url: "http://localhost".to_string(),
            log_level: "info".to_string(),
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, CoordinatorError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self, CoordinatorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let total_shards: u32 = lookup("TOTAL_SHARDS")
            .or_else(|| lookup("NUM_SHARDS"))
            .ok_or_else(|| CoordinatorError::Config("TOTAL_SHARDS or NUM_SHARDS must be set".to_string()))
            .and_then(|raw| parse_key("TOTAL_SHARDS", &raw))?;
        if total_shards == 0 {
            return Err(CoordinatorError::Config(
                "TOTAL_SHARDS must be at least 1".to_string(),
            ));
        }

        let heartbeat_timeout = parse_secs(&lookup, "HEARTBEAT_TIMEOUT_SECS")?;
        let sweep_period = parse_secs(&lookup, "SWEEP_PERIOD_SECS")?;

        let stale_policy = match lookup("STALE_PARTITION_POLICY") {
            Some(raw) => parse_key("STALE_PARTITION_POLICY", &raw)?,
            None => StalePartitionPolicy::default(),
        };

        let http_port = match lookup("HTTP_PORT") {
            Some(raw) => parse_key("HTTP_PORT", &raw)?,
            None => DEFAULT_HTTP_PORT,
        };

        let nats_url = lookup("NATS_URL").filter(|url| !url.trim().is_empty());

        let asset_root = lookup("ASSET_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/var/www"));

        let cdn_base_url = lookup("CDN_BASE_URL")
            .or_else(|| lookup("DOMAIN_NAME").map(|domain| format!("https://cdn.{domain}")))
            .unwrap_or_else(|| "http://localhost".to_string())
            .trim_end_matches('/')
            .to_string();

        let log_level = lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            total_shards,
            heartbeat_timeout,
            sweep_period,
            stale_policy,
            http_port,
            nats_url,
            asset_root,
            cdn_base_url,
            log_level,
        })
    }
}

fn parse_key<T>(key: &str, raw: &str) -> Result<T, CoordinatorError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| CoordinatorError::Config(format!("{key} is invalid: {e}")))
}

fn parse_secs<F>(lookup: &F, key: &str) -> Result<Duration, CoordinatorError>
where
    F: Fn(&str) -> Option<String>,
{
    let secs: u64 = match lookup(key) {
        Some(raw) => parse_key(key, &raw)?,
        None => DEFAULT_LIVENESS_SECS,
    };
    if secs == 0 {
        return Err(CoordinatorError::Config(format!("{key} must be greater than zero")));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<CoordinatorConfig, CoordinatorError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CoordinatorConfig::from_vars(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[("TOTAL_SHARDS", "4")]).unwrap();

        assert_eq!(config.total_shards, 4);
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(5));
        assert_eq!(config.sweep_period, Duration::from_secs(5));
        assert_eq!(config.stale_policy, StalePartitionPolicy::Discard);
        assert_eq!(config.http_port, 50051);
        assert!(config.nats_url.is_none());
        assert_eq!(config.asset_root, PathBuf::from("/var/www"));
        assert_eq!(config.cdn_base_url, "http://localhost");
    }

    #[test]
    fn test_num_shards_alias() {
        let config = load(&[("NUM_SHARDS", "7")]).unwrap();
        assert_eq!(config.total_shards, 7);
    }

    #[test]
    fn test_total_shards_required_and_positive() {
        assert!(matches!(load(&[]), Err(CoordinatorError::Config(_))));

        let err = load(&[("TOTAL_SHARDS", "0")]).unwrap_err();
        assert!(err.to_string().contains("at least 1"));

        let err = load(&[("TOTAL_SHARDS", "many")]).unwrap_err();
        assert!(err.to_string().contains("TOTAL_SHARDS"));
    }

    #[test]
    fn test_timings_are_independent_knobs() {
        let config = load(&[
            ("TOTAL_SHARDS", "2"),
            ("HEARTBEAT_TIMEOUT_SECS", "15"),
            ("SWEEP_PERIOD_SECS", "3"),
        ])
        .unwrap();
        assert_eq!(config.heartbeat_timeout, Duration::from_secs(15));
        assert_eq!(config.sweep_period, Duration::from_secs(3));

        let err = load(&[("TOTAL_SHARDS", "2"), ("SWEEP_PERIOD_SECS", "0")]).unwrap_err();
        assert!(err.to_string().contains("SWEEP_PERIOD_SECS"));
    }

    #[test]
    fn test_cdn_url_from_domain_name() {
        let config = load(&[("TOTAL_SHARDS", "1"), ("DOMAIN_NAME", "archit.us")]).unwrap();
        assert_eq!(config.cdn_base_url, "https://cdn.archit.us");

        let config = load(&[
            ("TOTAL_SHARDS", "1"),
            ("DOMAIN_NAME", "archit.us"),
            ("CDN_BASE_URL", "https://assets.example.com/"),
        ])
        .unwrap();
        assert_eq!(config.cdn_base_url, "https://assets.example.com");
    }

    #[test]
    fn test_stale_policy_parsing() {
        let config = load(&[("TOTAL_SHARDS", "1"), ("STALE_PARTITION_POLICY", "retain")]).unwrap();
        assert_eq!(config.stale_policy, StalePartitionPolicy::Retain);

        let err = load(&[("TOTAL_SHARDS", "1"), ("STALE_PARTITION_POLICY", "keep")]).unwrap_err();
        assert!(err.to_string().contains("STALE_PARTITION_POLICY"));
    }
}
