//! Configuration types and loading for the seed server.

use crate::dns::Zone;
use crate::error::SeedError;
use serde::Deserialize;
use std::fs;
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::{debug, info};

/// Default config.yaml embedded at compile time
pub const DEFAULT_CONFIG_YAML: &str = include_str!("../../config.yaml");

/// Main configuration struct for the server
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen: String,
    /// Responder loops sharing the port via SO_REUSEPORT when > 1
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default)]
    pub zone: ZoneConfig,
    /// Peer addresses served by the built-in selector
    #[serde(default)]
    pub seeds: Vec<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: default_listen_addr(),
            workers: default_workers(),
            zone: ZoneConfig::default(),
            seeds: vec![],
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Parse the configured seed addresses.
    pub fn seed_addrs(&self) -> Result<Vec<IpAddr>, SeedError> {
        self.seeds
            .iter()
            .map(|s| {
                s.parse()
                    .map_err(|_| SeedError::Config(format!("invalid seed address: {}", s)))
            })
            .collect()
    }
}

// ============== Zone Config ==============

#[derive(Debug, Deserialize, Clone)]
pub struct ZoneConfig {
    #[serde(default = "default_zone_host")]
    pub host: String,
    #[serde(default = "default_zone_ns")]
    pub ns: String,
    /// Zone contact; an '@' is accepted and converted to '.'
    #[serde(default)]
    pub mailbox: Option<String>,
    #[serde(default = "default_data_ttl")]
    pub data_ttl: u32,
    #[serde(default = "default_ns_ttl")]
    pub ns_ttl: u32,
}

fn default_zone_host() -> String {
    "seed.example.org".to_string()
}

fn default_zone_ns() -> String {
    "ns1.example.org".to_string()
}

fn default_data_ttl() -> u32 {
    60
}

fn default_ns_ttl() -> u32 {
    86400
}

impl Default for ZoneConfig {
    fn default() -> Self {
        ZoneConfig {
            host: default_zone_host(),
            ns: default_zone_ns(),
            mailbox: None,
            data_ttl: default_data_ttl(),
            ns_ttl: default_ns_ttl(),
        }
    }
}

impl ZoneConfig {
    /// Validate and convert into the responder's zone description.
    pub fn to_zone(&self) -> Result<Zone, SeedError> {
        if self.host.is_empty() {
            return Err(SeedError::Config("zone host must not be empty".to_string()));
        }
        if self.ns.is_empty() {
            return Err(SeedError::Config("zone ns must not be empty".to_string()));
        }
        let mbox = self
            .mailbox
            .as_ref()
            .map(|m| m.replacen('@', ".", 1))
            .filter(|m| !m.is_empty());
        Ok(Zone {
            host: self.host.clone(),
            ns: self.ns.clone(),
            mbox,
            data_ttl: self.data_ttl,
            ns_ttl: self.ns_ttl,
        })
    }
}

// ============== Logging Config ==============

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_requests")]
    pub log_requests: bool,
    #[serde(default)]
    pub format: LogFormat,
    /// File logging configuration
    #[serde(default)]
    pub file: Option<FileLoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FileLoggingConfig {
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
    #[serde(default)]
    pub rotation: LogRotation,
    /// Days to keep old log files (0 = keep forever)
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u64,
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_file_prefix() -> String {
    "seedns.log".to_string()
}

fn default_max_age_days() -> u64 {
    7
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        FileLoggingConfig {
            log_dir: default_log_dir(),
            file_prefix: default_log_file_prefix(),
            rotation: LogRotation::Daily,
            max_age_days: default_max_age_days(),
        }
    }
}

fn default_log_requests() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_requests: true,
            format: LogFormat::Text,
            file: None,
        }
    }
}

// ============== Default Values ==============

pub fn default_listen_addr() -> String {
    "0.0.0.0:53".to_string()
}

fn default_workers() -> usize {
    1
}

// ============== Config Loading ==============

/// Get the directory containing the executable
fn exe_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
}

/// Load configuration from file, falling back to the embedded default.
pub fn load_config(path: Option<&str>) -> Result<Config, SeedError> {
    let config_paths = if let Some(p) = path {
        vec![PathBuf::from(p)]
    } else {
        let mut paths = vec![PathBuf::from("config.yaml")];
        // Look next to the executable (handles portable setups)
        if let Some(dir) = exe_dir() {
            paths.push(dir.join("config.yaml"));
        }
        paths
    };

    for config_path in config_paths {
        if config_path.exists() {
            info!(path = %config_path.display(), "loading configuration");
            let content = fs::read_to_string(&config_path)?;
            let config: Config = serde_yaml_ng::from_str(&content)
                .map_err(|e| SeedError::Config(format!("{}: {}", config_path.display(), e)))?;
            return Ok(config);
        }
    }

    debug!("no configuration file found, using embedded defaults");
    serde_yaml_ng::from_str(DEFAULT_CONFIG_YAML)
        .map_err(|e| SeedError::Config(format!("embedded default config: {}", e)))
}

// ============== Unit Tests ==============

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listen_addr() {
        assert_eq!(default_listen_addr(), "0.0.0.0:53");
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.listen, "0.0.0.0:53");
        assert_eq!(config.workers, 1);
        assert!(config.seeds.is_empty());
    }

    #[test]
    fn test_config_deserialization_full() {
        let yaml = r#"
listen: "127.0.0.1:5353"
workers: 4
zone:
  host: "seed.coin.example"
  ns: "ns.coin.example"
  mailbox: "ops@coin.example"
  data_ttl: 30
  ns_ttl: 3600
seeds:
  - "203.0.113.7"
  - "2001:db8::1"
"#;
        let config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.listen, "127.0.0.1:5353");
        assert_eq!(config.workers, 4);
        assert_eq!(config.zone.host, "seed.coin.example");
        assert_eq!(config.zone.data_ttl, 30);
        assert_eq!(config.seeds.len(), 2);
        assert_eq!(config.seed_addrs().unwrap().len(), 2);
    }

    #[test]
    fn test_config_deserialization_partial() {
        let yaml = r#"
zone:
  host: "seed.coin.example"
"#;
        let config: Config = serde_yaml_ng::from_str(yaml).unwrap();
        assert_eq!(config.listen, "0.0.0.0:53"); // default
        assert_eq!(config.zone.host, "seed.coin.example");
        assert_eq!(config.zone.ns_ttl, 86400); // default
        assert!(config.zone.mailbox.is_none());
    }

    #[test]
    fn test_config_deserialization_empty() {
        let config: Config = serde_yaml_ng::from_str("").unwrap();
        assert_eq!(config.listen, "0.0.0.0:53");
    }

    #[test]
    fn test_mailbox_at_sign_becomes_dot() {
        let zone_config = ZoneConfig {
            mailbox: Some("hostmaster@example.org".to_string()),
            ..ZoneConfig::default()
        };
        let zone = zone_config.to_zone().unwrap();
        assert_eq!(zone.mbox.as_deref(), Some("hostmaster.example.org"));
    }

    #[test]
    fn test_mailbox_already_dotted() {
        let zone_config = ZoneConfig {
            mailbox: Some("hostmaster.example.org".to_string()),
            ..ZoneConfig::default()
        };
        let zone = zone_config.to_zone().unwrap();
        assert_eq!(zone.mbox.as_deref(), Some("hostmaster.example.org"));
    }

    #[test]
    fn test_empty_zone_host_rejected() {
        let zone_config = ZoneConfig {
            host: String::new(),
            ..ZoneConfig::default()
        };
        assert!(zone_config.to_zone().is_err());
    }

    #[test]
    fn test_invalid_seed_address_rejected() {
        let config = Config {
            seeds: vec!["not-an-address".to_string()],
            ..Config::default()
        };
        assert!(config.seed_addrs().is_err());
    }

    #[test]
    fn test_load_config_nonexistent_file_falls_back() {
        let config = load_config(Some("/nonexistent/path/config.yaml")).unwrap();
        assert_eq!(config.listen, "0.0.0.0:53");
    }

    #[test]
    fn test_embedded_default_config_parses() {
        let config: Config = serde_yaml_ng::from_str(DEFAULT_CONFIG_YAML).unwrap();
        assert_eq!(config.zone.host, "seed.example.org");
        assert!(config.zone.to_zone().is_ok());
        assert!(config.seed_addrs().is_ok());
    }

    #[test]
    fn test_log_format_default() {
        assert_eq!(LogFormat::default(), LogFormat::Text);
    }

    #[test]
    fn test_file_logging_config_default() {
        let config = FileLoggingConfig::default();
        assert_eq!(config.log_dir, "logs");
        assert_eq!(config.file_prefix, "seedns.log");
        assert_eq!(config.max_age_days, 7);
    }
}
