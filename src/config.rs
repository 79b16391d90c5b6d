//! Configuration management for rabbitmq-collectd
//!
//! Handles loading broker poll configuration from YAML files.
//!
//! Configuration is deliberately permissive: unknown keys are ignored,
//! value-less keys fall back to defaults, and missing fields never raise an
//! error. Every fallback value lives in the [`defaults`] table rather than
//! being scattered through the code.

use std::collections::HashMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// Central defaults table
///
/// A broker block with no keys at all polls `guest:guest@localhost:15672`
/// over plain http with certificate validation on.
pub mod defaults {
    /// Default management API username
    pub const USERNAME: &str = "guest";
    /// Default management API password
    pub const PASSWORD: &str = "guest";
    /// Default broker host
    pub const HOST: &str = "localhost";
    /// Default management API port
    pub const PORT: u16 = 15672;
    /// Default URL scheme
    pub const SCHEME: &str = "http";
    /// Default HTTP Basic auth realm
    pub const REALM: &str = "RabbitMQ Management";
    /// Certificate validation is on unless explicitly disabled
    pub const VALIDATE_CERTS: bool = true;
    /// Metric namespace prefix applied to every scope label
    pub const PREFIX: &str = "rabbitmq";
    /// Request timeout for management API calls, in milliseconds
    pub const TIMEOUT_MS: u64 = 5000;
    /// Seconds between poll cycles when running as a daemon
    pub const INTERVAL_SECS: u64 = 10;
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Error reading the configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Error parsing the configuration file
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// An ignore pattern failed to compile
    #[error("Invalid ignore pattern '{pattern}' for category '{category}': {source}")]
    InvalidIgnorePattern {
        category: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Seconds between poll cycles
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// One entry per broker to poll
    #[serde(default = "default_brokers")]
    pub brokers: Vec<BrokerConfig>,
}

/// Raw configuration for a single broker block
///
/// Keys are accepted in both `snake_case` and the collectd-style
/// `PascalCase` spellings. Every field is optional; resolution against the
/// [`defaults`] table happens in [`PollConfig::from_broker`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrokerConfig {
    /// Management API username
    #[serde(default, alias = "Username")]
    pub username: Option<String>,

    /// Management API password
    #[serde(default, alias = "Password")]
    pub password: Option<String>,

    /// Broker host
    #[serde(default, alias = "Host")]
    pub host: Option<String>,

    /// Management API port (number or string)
    #[serde(default, alias = "Port", deserialize_with = "de_opt_port")]
    pub port: Option<u16>,

    /// HTTP Basic auth realm
    #[serde(default, alias = "Realm")]
    pub realm: Option<String>,

    /// URL scheme (http or https)
    #[serde(default, alias = "Scheme")]
    pub scheme: Option<String>,

    /// Whether to validate TLS certificates
    #[serde(default, alias = "ValidateCerts")]
    pub validate_certs: Option<bool>,

    /// Optional label inserted between the namespace prefix and the
    /// normalized vhost name
    #[serde(default, alias = "VHostPrefix")]
    pub vhost_prefix: Option<String>,

    /// Metric namespace prefix
    #[serde(default, alias = "Prefix")]
    pub prefix: Option<String>,

    /// Request timeout in milliseconds
    #[serde(default, alias = "TimeoutMs")]
    pub timeout_ms: Option<u64>,

    /// Per-category ignore patterns (category name to regex list)
    #[serde(default, alias = "Ignore")]
    pub ignore: HashMap<String, Vec<String>>,
}

// Default value functions
fn default_interval_secs() -> u64 {
    defaults::INTERVAL_SECS
}

fn default_brokers() -> Vec<BrokerConfig> {
    vec![BrokerConfig::default()]
}

/// Accepts a port written as a number or a string; anything else falls
/// back to the default.
fn de_opt_port<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(serde_yaml::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            brokers: default_brokers(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a YAML file, falling back to defaults if not
    /// found
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        Self::load(path)
    }

    /// Resolve every broker block into an immutable [`PollConfig`]
    ///
    /// # Errors
    /// Returns an error if any ignore pattern fails to compile
    pub fn poll_configs(&self) -> Result<Vec<PollConfig>, ConfigError> {
        self.brokers.iter().map(PollConfig::from_broker).collect()
    }
}

/// Broker connection endpoint. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Connection {
    /// URL scheme (http or https)
    pub scheme: String,
    /// Broker host
    pub host: String,
    /// Management API port
    pub port: u16,
    /// Whether to validate TLS certificates
    pub validate_certs: bool,
}

impl Connection {
    /// Base URL for the broker, without the `/api` suffix
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// HTTP Basic auth credentials
#[derive(Debug, Clone)]
pub struct Credentials {
    /// Username sent on every request
    pub username: String,
    /// Password sent on every request
    pub password: String,
    /// Authentication realm reported by the management API. Requests send
    /// preemptive Basic auth, so the realm is never matched against a
    /// challenge; it is kept for configuration compatibility.
    pub realm: String,
}

/// Per-category ignore patterns, compiled once at startup and immutable for
/// the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: HashMap<String, Vec<Regex>>,
}

impl IgnoreRules {
    /// Compile raw pattern strings into per-category regex lists
    ///
    /// # Errors
    /// Returns an error if any pattern fails to compile
    pub fn compile(raw: &HashMap<String, Vec<String>>) -> Result<Self, ConfigError> {
        let mut rules = HashMap::new();
        for (category, patterns) in raw {
            let mut compiled = Vec::with_capacity(patterns.len());
            for pattern in patterns {
                // Anchor at the start: a rule suppresses a name when it
                // matches as a prefix, not only as a full match.
                let anchored = format!("^(?:{})", pattern);
                let regex =
                    Regex::new(&anchored).map_err(|e| ConfigError::InvalidIgnorePattern {
                        category: category.clone(),
                        pattern: pattern.clone(),
                        source: e,
                    })?;
                compiled.push(regex);
            }
            rules.insert(category.clone(), compiled);
        }
        Ok(Self { rules })
    }

    /// Returns true if `name` of the given category should be ignored
    pub fn is_ignored(&self, category: &str, name: &str) -> bool {
        self.rules
            .get(category)
            .map(|patterns| patterns.iter().any(|p| p.is_match(name)))
            .unwrap_or(false)
    }

    /// Number of categories that carry at least one pattern
    pub fn len(&self) -> usize {
        self.rules.values().filter(|p| !p.is_empty()).count()
    }

    /// Returns true if no patterns are configured
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything needed to poll one broker
///
/// Built once from a [`BrokerConfig`] and held for the process lifetime;
/// changing configuration requires a restart. One `PollConfig` per broker,
/// each producing an isolated client/engine instance.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Broker endpoint
    pub connection: Connection,
    /// HTTP Basic auth credentials
    pub credentials: Credentials,
    /// Per-category ignore patterns
    pub ignore: IgnoreRules,
    /// Optional label inserted between the namespace prefix and the
    /// normalized vhost name
    pub vhost_prefix: Option<String>,
    /// Metric namespace prefix applied to every scope label
    pub prefix: String,
    /// Request timeout for management API calls
    pub timeout_ms: u64,
}

impl PollConfig {
    /// Resolve a raw broker block against the [`defaults`] table
    ///
    /// # Errors
    /// Returns an error if any ignore pattern fails to compile
    pub fn from_broker(broker: &BrokerConfig) -> Result<Self, ConfigError> {
        let vhost_prefix = broker
            .vhost_prefix
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(str::to_string);

        Ok(Self {
            connection: Connection {
                scheme: broker
                    .scheme
                    .clone()
                    .unwrap_or_else(|| defaults::SCHEME.to_string()),
                host: broker
                    .host
                    .clone()
                    .unwrap_or_else(|| defaults::HOST.to_string()),
                port: broker.port.unwrap_or(defaults::PORT),
                validate_certs: broker.validate_certs.unwrap_or(defaults::VALIDATE_CERTS),
            },
            credentials: Credentials {
                username: broker
                    .username
                    .clone()
                    .unwrap_or_else(|| defaults::USERNAME.to_string()),
                password: broker
                    .password
                    .clone()
                    .unwrap_or_else(|| defaults::PASSWORD.to_string()),
                realm: broker
                    .realm
                    .clone()
                    .unwrap_or_else(|| defaults::REALM.to_string()),
            },
            ignore: IgnoreRules::compile(&broker.ignore)?,
            vhost_prefix,
            prefix: broker
                .prefix
                .clone()
                .unwrap_or_else(|| defaults::PREFIX.to_string()),
            timeout_ms: broker.timeout_ms.unwrap_or(defaults::TIMEOUT_MS),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.interval_secs, 10);
        assert_eq!(config.brokers.len(), 1);

        let poll = config.poll_configs().unwrap();
        assert_eq!(poll[0].connection.base_url(), "http://localhost:15672");
        assert_eq!(poll[0].credentials.username, "guest");
        assert_eq!(poll[0].credentials.password, "guest");
        assert_eq!(poll[0].credentials.realm, "RabbitMQ Management");
        assert!(poll[0].connection.validate_certs);
        assert_eq!(poll[0].prefix, "rabbitmq");
        assert!(poll[0].vhost_prefix.is_none());
        assert!(poll[0].ignore.is_empty());
    }

    #[test]
    fn test_empty_broker_block_uses_defaults() {
        let config: Config = serde_yaml::from_str("brokers:\n  - {}\n").unwrap();
        let poll = config.poll_configs().unwrap();
        assert_eq!(poll.len(), 1);
        assert_eq!(poll[0].connection.host, "localhost");
        assert_eq!(poll[0].connection.port, 15672);
        assert_eq!(poll[0].connection.scheme, "http");
    }

    #[test]
    fn test_pascal_case_keys() {
        let yaml = r#"
brokers:
  - Username: admin
    Password: secret
    Host: rabbit.example.com
    Port: "15671"
    Scheme: https
    ValidateCerts: false
    VHostPrefix: prod
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let poll = config.poll_configs().unwrap();
        assert_eq!(poll[0].credentials.username, "admin");
        assert_eq!(poll[0].credentials.password, "secret");
        assert_eq!(
            poll[0].connection.base_url(),
            "https://rabbit.example.com:15671"
        );
        assert!(!poll[0].connection.validate_certs);
        assert_eq!(poll[0].vhost_prefix.as_deref(), Some("prod"));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let yaml = r#"
brokers:
  - Host: localhost
    FrobnicateLevel: 9
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.brokers.len(), 1);
    }

    #[test]
    fn test_value_less_keys_fall_back() {
        let yaml = r#"
brokers:
  - Username:
    Port:
    Host: broker1
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let poll = config.poll_configs().unwrap();
        assert_eq!(poll[0].credentials.username, "guest");
        assert_eq!(poll[0].connection.port, 15672);
        assert_eq!(poll[0].connection.host, "broker1");
    }

    #[test]
    fn test_multiple_brokers() {
        let yaml = r#"
brokers:
  - Host: broker1
  - Host: broker2
    Port: 15673
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let poll = config.poll_configs().unwrap();
        assert_eq!(poll.len(), 2);
        assert_eq!(poll[0].connection.host, "broker1");
        assert_eq!(poll[1].connection.port, 15673);
    }

    #[test]
    fn test_ignore_rules_prefix_match() {
        let mut raw = HashMap::new();
        raw.insert("queue".to_string(), vec!["tmp-".to_string()]);
        let rules = IgnoreRules::compile(&raw).unwrap();

        // Anchored prefix match, not full match
        assert!(rules.is_ignored("queue", "tmp-scratch"));
        assert!(rules.is_ignored("queue", "tmp-"));
        assert!(!rules.is_ignored("queue", "not-tmp-scratch"));
        // Other categories are unaffected
        assert!(!rules.is_ignored("exchange", "tmp-scratch"));
    }

    #[test]
    fn test_ignore_rules_regex_pattern() {
        let mut raw = HashMap::new();
        raw.insert("exchange".to_string(), vec![r"amq\.".to_string()]);
        let rules = IgnoreRules::compile(&raw).unwrap();

        assert!(rules.is_ignored("exchange", "amq.topic"));
        assert!(!rules.is_ignored("exchange", "orders"));
    }

    #[test]
    fn test_invalid_ignore_pattern() {
        let mut raw = HashMap::new();
        raw.insert("queue".to_string(), vec!["tmp-[".to_string()]);
        let result = IgnoreRules::compile(&raw);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidIgnorePattern { .. })
        ));
    }

    #[test]
    fn test_empty_vhost_prefix_is_none() {
        let yaml = r#"
brokers:
  - VHostPrefix: ""
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let poll = config.poll_configs().unwrap();
        assert!(poll[0].vhost_prefix.is_none());
    }

    #[test]
    fn test_ignore_config_compiles() {
        let yaml = r#"
brokers:
  - Ignore:
      queue:
        - "amq-gen-"
        - "tmp-"
      exchange:
        - "amq\\."
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let poll = config.poll_configs().unwrap();
        assert_eq!(poll[0].ignore.len(), 2);
        assert!(poll[0].ignore.is_ignored("queue", "amq-gen-x7Jq"));
        assert!(poll[0].ignore.is_ignored("exchange", "amq.direct"));
    }
}
