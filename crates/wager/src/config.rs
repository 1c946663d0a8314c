use crate::error::MatchError;
use std::time::Duration;

/// Environment variable holding the PostgreSQL connection string.
pub const DATABASE_URL_ENV: &str = "WAGER_DATABASE_URL";
/// Environment variable overriding [`StoreConfig::max_connections`].
pub const MAX_CONNECTIONS_ENV: &str = "WAGER_MAX_CONNECTIONS";
/// Environment variable overriding [`StoreConfig::acquire_timeout`], in seconds.
pub const ACQUIRE_TIMEOUT_ENV: &str = "WAGER_ACQUIRE_TIMEOUT_SECS";

/// Configuration for the persistent match store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// PostgreSQL connection string. Default: `postgres://localhost/wager`.
    pub database_url: String,
    /// Maximum pooled connections. Default: 5.
    pub max_connections: u32,
    /// How long a store operation may wait for a pooled connection before
    /// failing. This is the only timeout on store operations. Default: 30s.
    pub acquire_timeout: Duration,
    /// Run embedded migrations on connect. Default: true.
    pub run_migrations: bool,
}

impl StoreConfig {
    /// Build a config from `WAGER_*` environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, MatchError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MatchError> {
        let mut config = Self::default();
        if let Some(url) = lookup(DATABASE_URL_ENV) {
            config.database_url = url;
        }
        if let Some(raw) = lookup(MAX_CONNECTIONS_ENV) {
            config.max_connections = raw.trim().parse().map_err(|e| MatchError::InvalidConfig {
                reason: format!("{MAX_CONNECTIONS_ENV} must be an integer, got {raw:?}: {e}"),
            })?;
        }
        if let Some(raw) = lookup(ACQUIRE_TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|e| MatchError::InvalidConfig {
                reason: format!("{ACQUIRE_TIMEOUT_ENV} must be an integer, got {raw:?}: {e}"),
            })?;
            config.acquire_timeout = Duration::from_secs(secs);
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// Checks:
    /// - `database_url` is a `postgres://` or `postgresql://` URL
    /// - `max_connections >= 1`
    /// - `acquire_timeout > 0`
    pub fn validate(&self) -> Result<(), MatchError> {
        if !(self.database_url.starts_with("postgres://")
            || self.database_url.starts_with("postgresql://"))
        {
            return Err(MatchError::InvalidConfig {
                reason: "database_url must start with postgres:// or postgresql://".to_string(),
            });
        }
        if self.max_connections == 0 {
            return Err(MatchError::InvalidConfig {
                reason: "max_connections must be >= 1".to_string(),
            });
        }
        if self.acquire_timeout.is_zero() {
            return Err(MatchError::InvalidConfig {
                reason: "acquire_timeout must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Open a connection pool for this configuration.
    #[cfg(feature = "sql")]
    pub async fn connect(&self) -> Result<sqlx::PgPool, MatchError> {
        self.validate()?;
        tracing::info!(max_connections = self.max_connections, "connecting to match store");
        sqlx::postgres::PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.database_url)
            .await
            .map_err(|e| MatchError::ReadFailure {
                reason: format!("connect to match store failed: {e}"),
                source: Some(Box::new(e)),
            })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/wager".to_string(),
            max_connections: 5,
            acquire_timeout: Duration::from_secs(30),
            run_migrations: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_values() {
        let config = StoreConfig::default();
        assert_eq!(config.database_url, "postgres://localhost/wager");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert!(config.run_migrations);
    }

    #[test]
    fn default_config_is_valid() {
        StoreConfig::default().validate().unwrap();
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[
            (DATABASE_URL_ENV, "postgresql://db.internal/marbles"),
            (MAX_CONNECTIONS_ENV, "12"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "postgresql://db.internal/marbles");
        assert_eq!(config.max_connections, 12);
        // Other fields keep defaults
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
    }

    #[test]
    fn lookup_rejects_non_numeric_pool_size() {
        let err = StoreConfig::from_lookup(lookup(&[(MAX_CONNECTIONS_ENV, "many")])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(MAX_CONNECTIONS_ENV), "got: {msg}");
    }

    #[test]
    fn validate_rejects_non_postgres_url() {
        let config = StoreConfig {
            database_url: "sqlite://wager.db".to_string(),
            ..Default::default()
        };
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("database_url"), "got: {msg}");
    }

    #[test]
    fn validate_zero_max_connections() {
        let config = StoreConfig {
            max_connections: 0,
            ..Default::default()
        };
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("max_connections"), "got: {msg}");
    }

    #[test]
    fn validate_zero_acquire_timeout() {
        let config = StoreConfig {
            acquire_timeout: Duration::ZERO,
            ..Default::default()
        };
        let msg = config.validate().unwrap_err().to_string();
        assert!(msg.contains("acquire_timeout"), "got: {msg}");
    }
}
