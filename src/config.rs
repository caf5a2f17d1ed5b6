//! Typed configuration, loaded once in `main` and passed by value into
//! every component that needs it — no `Config::cfg` process-wide
//! singleton, per the "Global state" design note.
//!
//! The original config describes an INI file with `network`/`cpu`/`rates`/`kafka`/
//! `log` sections; resolved here as TOML tables of the same names,
//! following the `PerfConfig::load`/`from_env` pattern in
//! `examples/cooprefr-bettersys/rust-backend/src/performance/config.rs`
//! (see DESIGN.md for why TOML over INI).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{VenueError, VenueResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub url: String,
    pub port_tcp_up: u16,
    pub port_tcp_down: u16,
    pub port_udp: u16,
    #[serde(default)]
    pub shm_path: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            url: "0.0.0.0".to_string(),
            port_tcp_up: 7001,
            port_tcp_down: 7002,
            port_udp: 7003,
            shm_path: None,
        }
    }
}

/// Comma-separated core index lists in the source INI become native
/// arrays in TOML — no string-splitting required at load time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuConfig {
    #[serde(default)]
    pub core_system: Option<usize>,
    #[serde(default)]
    pub cores_network: Vec<usize>,
    #[serde(default)]
    pub cores_app: Vec<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesConfig {
    #[serde(default = "default_price_feed_rate_ms")]
    pub price_feed_rate_ms: u64,
    #[serde(default = "default_monitor_rate_secs")]
    pub monitor_rate_secs: u64,
}

fn default_price_feed_rate_ms() -> u64 {
    500
}

fn default_monitor_rate_secs() -> u64 {
    5
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            price_feed_rate_ms: default_price_feed_rate_ms(),
            monitor_rate_secs: default_monitor_rate_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    #[serde(default)]
    pub broker: String,
    #[serde(default)]
    pub consumer_group: String,
    #[serde(default = "default_kafka_poll_rate_ms")]
    pub poll_rate_ms: u64,
}

fn default_kafka_poll_rate_ms() -> u64 {
    100
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            broker: String::new(),
            consumer_group: String::new(),
            poll_rate_ms: default_kafka_poll_rate_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "stdout".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub cpu: CpuConfig,
    #[serde(default)]
    pub rates: RatesConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Loads and validates a config file. `cores_network` and
    /// `cores_app` must be disjoint; `core_system`, if set,
    /// must not overlap either.
    pub fn load(path: impl AsRef<Path>) -> VenueResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| VenueError::Config(format!("cannot read {:?}: {e}", path.as_ref())))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| VenueError::Config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> VenueResult<()> {
        let network: std::collections::HashSet<_> = self.cpu.cores_network.iter().collect();
        let app: std::collections::HashSet<_> = self.cpu.cores_app.iter().collect();
        if !network.is_disjoint(&app) {
            return Err(VenueError::Config(
                "cores_network and cores_app must be disjoint".to_string(),
            ));
        }
        if let Some(system) = self.cpu.core_system {
            if network.contains(&system) || app.contains(&system) {
                return Err(VenueError::Config(
                    "core_system overlaps a network or app core".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn overlapping_cores_rejected() {
        let mut config = Config::default();
        config.cpu.cores_network = vec![1, 2];
        config.cpu.cores_app = vec![2, 3];
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_full_toml() {
        let toml = r#"
            [network]
            url = "0.0.0.0"
            port_tcp_up = 9001
            port_tcp_down = 9002
            port_udp = 9003

            [cpu]
            core_system = 0
            cores_network = [1, 2]
            cores_app = [3, 4, 5]

            [rates]
            price_feed_rate_ms = 250
            monitor_rate_secs = 10

            [log]
            level = "debug"
            output = "stdout"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.network.port_tcp_up, 9001);
        assert_eq!(config.cpu.cores_app, vec![3, 4, 5]);
        assert_eq!(config.rates.monitor_rate_secs, 10);
    }
}
