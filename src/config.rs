//! Cache configuration
//!
//! Capacity and idle expiry for the live cache storage. Loaded from JSON or
//! from `METACACHE_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Default maximum number of cached entries
pub const DEFAULT_CAPACITY: u64 = 10_000;

/// Environment variable overriding the entry capacity
pub const CAPACITY_ENV: &str = "METACACHE_CAPACITY";

/// Environment variable setting the idle expiry in seconds
pub const IDLE_SECS_ENV: &str = "METACACHE_IDLE_SECS";

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cache capacity must be greater than zero")]
    ZeroCapacity,

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Deserialize an optional number of seconds into a Duration
fn deserialize_secs<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
}

/// Live cache storage settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheConfig {
    /// Maximum number of entries kept before least recently used ones are evicted
    pub capacity: u64,
    /// Evict entries not read for this long (None = never)
    #[serde(rename = "timeToIdleSecs", deserialize_with = "deserialize_secs")]
    pub time_to_idle: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            time_to_idle: None,
        }
    }
}

impl CacheConfig {
    /// Parse and validate a JSON config document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a config from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup
    ///
    /// Unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(value) = lookup(CAPACITY_ENV) {
            config.capacity = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: CAPACITY_ENV,
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(IDLE_SECS_ENV) {
            let secs: u64 = value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: IDLE_SECS_ENV,
                value: value.clone(),
            })?;
            config.time_to_idle = Some(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert!(config.time_to_idle.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_json_config() {
        let config = CacheConfig::from_json(r#"{"capacity":50,"timeToIdleSecs":30}"#).unwrap();
        assert_eq!(config.capacity, 50);
        assert_eq!(config.time_to_idle, Some(Duration::from_secs(30)));

        let config = CacheConfig::from_json("{}").unwrap();
        assert_eq!(config, CacheConfig::default());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = CacheConfig::from_json(r#"{"capacity":0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroCapacity));
    }

    #[test]
    fn test_lookup_overrides() {
        let vars: HashMap<&str, &str> = [(CAPACITY_ENV, "12"), (IDLE_SECS_ENV, " 90 ")].into();
        let config =
            CacheConfig::from_lookup(|name| vars.get(name).map(|v| v.to_string())).unwrap();
        assert_eq!(config.capacity, 12);
        assert_eq!(config.time_to_idle, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_lookup_invalid_value() {
        let err = CacheConfig::from_lookup(|name| {
            (name == CAPACITY_ENV).then(|| "lots".to_string())
        })
        .unwrap_err();
        match err {
            ConfigError::InvalidEnv { name, value } => {
                assert_eq!(name, CAPACITY_ENV);
                assert_eq!(value, "lots");
            }
            other => panic!("Expected InvalidEnv, got {other:?}"),
        }
    }
}
