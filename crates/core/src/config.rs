//! Configuration types shared across crates.

use crate::schema_version::SchemaVersion;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

impl PgSslMode {
    /// Value of the `sslmode` connection parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Prefer => "prefer",
            Self::Require => "require",
        }
    }
}

/// Index store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum IndexConfig {
    /// SQLite database (local development and tests).
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Maximum connections in the pool.
        #[serde(default = "default_sqlite_max_connections")]
        max_connections: u32,
        /// Seconds to wait for a pooled connection before failing.
        #[serde(default = "default_acquire_timeout_secs")]
        acquire_timeout_secs: u64,
    },
    /// PostgreSQL database.
    Postgres {
        /// Connection URL (optional if using individual fields).
        /// Takes precedence over individual fields if both are provided.
        url: Option<String>,
        /// Database host.
        host: Option<String>,
        /// Database port (default: 5432).
        #[serde(default = "default_pg_port")]
        port: Option<u16>,
        /// Database username.
        username: Option<String>,
        /// Database password.
        /// WARNING: Prefer DICOMIDX_INDEX__PASSWORD over storing it in a config file.
        password: Option<String>,
        /// Database name.
        database: Option<String>,
        /// SSL mode for connections.
        ssl_mode: Option<PgSslMode>,
        /// Maximum connections in the pool.
        #[serde(default = "default_max_connections")]
        max_connections: u32,
        /// Statement timeout in milliseconds. PostgreSQL cancels longer statements.
        #[serde(default = "default_statement_timeout_ms")]
        statement_timeout_ms: Option<u64>,
        /// Seconds to wait for a pooled connection before failing.
        #[serde(default = "default_acquire_timeout_secs")]
        acquire_timeout_secs: u64,
    },
}

fn default_sqlite_max_connections() -> u32 {
    4
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_port() -> Option<u16> {
    Some(5432)
}

fn default_statement_timeout_ms() -> Option<u64> {
    Some(60_000)
}

fn default_acquire_timeout_secs() -> u64 {
    30
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/index.db"),
            max_connections: default_sqlite_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

impl IndexConfig {
    /// SQLite configuration for the given path with default pool settings.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        Self::Sqlite {
            path: path.into(),
            max_connections: default_sqlite_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }

    /// PostgreSQL configuration for a connection URL with default pool settings.
    pub fn postgres_url(url: impl Into<String>) -> Self {
        Self::Postgres {
            url: Some(url.into()),
            host: None,
            port: default_pg_port(),
            username: None,
            password: None,
            database: None,
            ssl_mode: None,
            max_connections: default_max_connections(),
            statement_timeout_ms: default_statement_timeout_ms(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }

    /// Maximum pooled connections.
    pub fn max_connections(&self) -> u32 {
        match self {
            Self::Sqlite {
                max_connections, ..
            }
            | Self::Postgres {
                max_connections, ..
            } => *max_connections,
        }
    }

    /// Time to wait for a pooled connection.
    pub fn acquire_timeout(&self) -> Duration {
        match self {
            Self::Sqlite {
                acquire_timeout_secs,
                ..
            }
            | Self::Postgres {
                acquire_timeout_secs,
                ..
            } => Duration::from_secs(*acquire_timeout_secs),
        }
    }

    /// Validate index configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_connections() == 0 {
            return Err("index.max_connections must be at least 1".to_string());
        }
        match self {
            IndexConfig::Sqlite { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err("sqlite config requires a non-empty 'path'".to_string());
                }
                Ok(())
            }
            IndexConfig::Postgres {
                url,
                host,
                database,
                ..
            } => match (url.as_ref(), host.as_ref(), database.as_ref()) {
                (Some(_), _, _) => Ok(()),
                (None, Some(_), Some(_)) => Ok(()),
                (None, None, _) => Err(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ),
                (None, Some(_), None) => Err(
                    "postgres config requires 'database' when using individual fields".to_string(),
                ),
            },
        }
    }
}

/// Active schema version configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Schema version reported by the deployment. Resolved to the highest
    /// known version at or below this value.
    #[serde(default = "default_schema_version")]
    pub version: i32,
}

fn default_schema_version() -> i32 {
    SchemaVersion::LATEST.as_i32()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            version: default_schema_version(),
        }
    }
}

impl SchemaConfig {
    /// Validate that the configured version can be served by this build.
    pub fn validate(&self) -> Result<(), String> {
        SchemaVersion::resolve(self.version)
            .map(|_| ())
            .map_err(|e| format!("schema.version: {e}"))
    }
}

/// Deleted-instance reclamation parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReclamationConfig {
    /// Maximum number of deleted instances fetched per batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Deleted instances that failed cleanup this many times are no longer retried.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_batch_size() -> u32 {
    10
}

fn default_max_retries() -> u32 {
    5
}

impl Default for ReclamationConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
        }
    }
}

impl ReclamationConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("reclamation.batch_size must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Index store configuration.
    #[serde(default)]
    pub index: IndexConfig,
    /// Active schema version.
    #[serde(default)]
    pub schema: SchemaConfig,
    /// Reclamation parameters.
    #[serde(default)]
    pub reclamation: ReclamationConfig,
}

impl AppConfig {
    /// Validate every section.
    pub fn validate(&self) -> crate::Result<()> {
        self.index
            .validate()
            .and_then(|_| self.schema.validate())
            .and_then(|_| self.reclamation.validate())
            .map_err(crate::Error::Config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schema.version, SchemaVersion::LATEST.as_i32());
        assert_eq!(config.reclamation.batch_size, 10);
        assert_eq!(config.reclamation.max_retries, 5);
        assert!(matches!(config.index, IndexConfig::Sqlite { .. }));
    }

    #[test]
    fn test_index_config_sqlite_deserialize_defaults() {
        let json = r#"{"type":"sqlite","path":"/tmp/index.db"}"#;
        let config: IndexConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_connections(), 4);
        assert_eq!(config.acquire_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_index_config_postgres_requires_url_or_host() {
        let json = r#"{"type":"postgres"}"#;
        let config: IndexConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().unwrap_err().contains("'url' or 'host'"));

        let json = r#"{"type":"postgres","host":"db"}"#;
        let config: IndexConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().unwrap_err().contains("'database'"));

        let json = r#"{"type":"postgres","host":"db","database":"dicom"}"#;
        let config: IndexConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_ok());

        assert!(IndexConfig::postgres_url("postgres://db/dicom").validate().is_ok());
    }

    #[test]
    fn test_index_config_rejects_empty_pool() {
        let config = IndexConfig::Sqlite {
            path: PathBuf::from("index.db"),
            max_connections: 0,
            acquire_timeout_secs: 1,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_schema_config_rejects_too_old_version() {
        let config = SchemaConfig { version: 0 };
        assert!(config.validate().unwrap_err().starts_with("schema.version"));
        assert!(SchemaConfig { version: 500 }.validate().is_ok());
    }

    #[test]
    fn test_reclamation_config_rejects_zero_batch() {
        let config = ReclamationConfig {
            batch_size: 0,
            max_retries: 5,
        };
        assert!(config.validate().is_err());

        let mut app = AppConfig::default();
        app.reclamation = config;
        assert!(matches!(app.validate(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_reclamation_config_allows_zero_retries() {
        let config: ReclamationConfig = serde_json::from_str(r#"{"max_retries":0}"#).unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_retries, 0);
        assert!(config.validate().is_ok());
    }
}
