//! Configuration management for the catalog rate limiter.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{LimiterError, Result};
use crate::ratelimit::{LimiterConfig, PolicyTable};

/// Main configuration for the rate limiter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Counter store settings
    #[serde(default)]
    pub limiter: LimiterSettings,

    /// Call-site policies
    #[serde(default = "PolicyTable::site_defaults")]
    pub policies: PolicyTable,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            limiter: LimiterSettings::default(),
            policies: PolicyTable::site_defaults(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Counter store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Maximum distinct tokens tracked at once
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Counter time-to-live in milliseconds
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            window_ms: default_window_ms(),
        }
    }
}

impl LimiterSettings {
    /// The limiter configuration these settings describe.
    pub fn limiter_config(&self) -> LimiterConfig {
        LimiterConfig::new(self.capacity, Duration::from_millis(self.window_ms))
    }
}

fn default_capacity() -> usize {
    500
}

fn default_window_ms() -> u64 {
    60_000
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl ServiceConfig {
    /// Load configuration from a file path.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ServiceConfig = serde_yaml::from_str(yaml)
            .map_err(|e| LimiterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check settings that would make the limiter unusable.
    pub fn validate(&self) -> Result<()> {
        if self.limiter.capacity == 0 {
            return Err(LimiterError::InvalidConfig(
                "limiter.capacity must be greater than zero".to_string(),
            ));
        }
        if self.limiter.window_ms == 0 {
            return Err(LimiterError::InvalidConfig(
                "limiter.window_ms must be greater than zero".to_string(),
            ));
        }
        self.policies.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.limiter.capacity, 500);
        assert_eq!(config.limiter.window_ms, 60_000);
        assert_eq!(
            config.limiter.limiter_config().window,
            Duration::from_secs(60)
        );
        assert_eq!(config.policies.len(), 4);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = ServiceConfig::from_yaml("{}").unwrap();
        assert_eq!(config.limiter.capacity, 500);
        assert!(config.policies.get("search").is_some());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
limiter:
  capacity: 1000
  window_ms: 30000
policies:
  search:
    token: SEARCH
    limit: 20
    scope: per_client
logging:
  level: debug
  json: true
"#;
        let config = ServiceConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.limiter.capacity, 1000);
        assert_eq!(config.limiter.window_ms, 30_000);
        assert_eq!(config.policies.len(), 1);
        assert_eq!(config.policies.get("search").unwrap().limit, 20);
        assert!(config.logging.json);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let yaml = r#"
limiter:
  capacity: 0
"#;
        let err = ServiceConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, LimiterError::InvalidConfig(_)));
    }

    #[test]
    fn test_max_capacity_from_yaml_builds_limiter() {
        let yaml = r#"
limiter:
  capacity: 18446744073709551615
"#;
        let config = ServiceConfig::from_yaml(yaml).unwrap();
        let limiter =
            crate::ratelimit::RateLimiter::new(config.limiter.limiter_config()).unwrap();

        assert!(limiter.check("CACHE_TOKEN", 10).unwrap().is_admitted());
    }

    #[test]
    fn test_zero_window_rejected() {
        let yaml = r#"
limiter:
  window_ms: 0
"#;
        let err = ServiceConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, LimiterError::InvalidConfig(_)));
    }

    #[test]
    fn test_negative_window_is_parse_error() {
        let yaml = r#"
limiter:
  window_ms: -5
"#;
        let err = ServiceConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let yaml = r#"
policies:
  search:
    token: SEARCH
    limit: 0
"#;
        assert!(ServiceConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = ServiceConfig::from_file("/nonexistent/catalog-ratelimit.yaml").unwrap_err();
        assert!(matches!(err, LimiterError::Io(_)));
    }
}
