//! Redis connection configuration.

use serde::{Deserialize, Serialize};

/// Errors raised while loading or checking a [`RedisConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Redis connection settings.
///
/// # Example (TOML)
///
/// ```toml
/// url = "redis://cache.internal:6379"
/// database = 2
/// pool_size = 16
/// timeout_ms = 2000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Logical database index selected on every pooled connection.
    #[serde(default)]
    pub database: u32,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Pool wait/create/recycle timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
            database: 0,
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

impl RedisConfig {
    /// Parses a configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::Validation` for out-of-range values.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool_size == 0 {
            return Err(ConfigError::Validation(
                "pool_size must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "timeout_ms must be at least 1".to_string(),
            ));
        }
        self.connection_url().map(|_| ())
    }

    /// The connection URL with [`database`](Self::database) applied.
    ///
    /// A non-zero `database` overrides any database path in `url`.
    pub fn connection_url(&self) -> Result<String, ConfigError> {
        let mut url = url::Url::parse(&self.url)
            .map_err(|e| ConfigError::Validation(format!("invalid redis url: {e}")))?;
        if !matches!(url.scheme(), "redis" | "rediss") {
            return Err(ConfigError::Validation(format!(
                "unsupported redis url scheme '{}'",
                url.scheme()
            )));
        }
        if self.database != 0 {
            url.set_path(&format!("/{}", self.database));
        }
        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RedisConfig::default();
        assert_eq!(config.url, "redis://localhost:6379");
        assert_eq!(config.database, 0);
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.timeout_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_partial() {
        let config = RedisConfig::from_toml_str(
            r#"
            url = "redis://cache:6380"
            database = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.database, 3);
        assert_eq!(config.pool_size, 10);
        assert_eq!(config.connection_url().unwrap(), "redis://cache:6380/3");
    }

    #[test]
    fn test_database_zero_keeps_url() {
        let config = RedisConfig {
            url: "redis://cache:6379/5".to_string(),
            ..Default::default()
        };
        assert_eq!(config.connection_url().unwrap(), "redis://cache:6379/5");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            RedisConfig::from_toml_str("pool_size = 0"),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            RedisConfig::from_toml_str("url = \"http://cache\""),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            RedisConfig::from_toml_str("url = ["),
            Err(ConfigError::Parse(_))
        ));
    }
}
