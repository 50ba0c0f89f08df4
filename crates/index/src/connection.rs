//! Pooled connections to the relational store.

use crate::error::{IndexError, IndexResult};
use dicomidx_core::config::{IndexConfig, PgSslMode};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use sqlx::any::{AnyPoolOptions, install_default_drivers};
use sqlx::pool::PoolConnection;
use sqlx::{Any, AnyPool};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Applied to every new SQLite connection.
const SQLITE_PRAGMAS: &[&str] = &[
    "PRAGMA journal_mode = WAL",
    "PRAGMA synchronous = NORMAL",
    "PRAGMA busy_timeout = 5000",
];

/// Relational engine behind the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Postgres,
}

/// Hands out scoped connections to the index database.
///
/// A connection returned by [`ConnectionFactory::acquire`] goes back to the
/// pool when dropped, on every exit path.
#[derive(Clone, Debug)]
pub struct ConnectionFactory {
    pool: AnyPool,
    backend: Backend,
}

impl ConnectionFactory {
    /// Connect using the index configuration.
    pub async fn from_config(config: &IndexConfig) -> IndexResult<Self> {
        config.validate().map_err(IndexError::Config)?;

        match config {
            IndexConfig::Sqlite { path, .. } => Self::sqlite(path, config).await,
            IndexConfig::Postgres {
                url,
                host,
                port,
                username,
                password,
                database,
                ssl_mode,
                statement_timeout_ms,
                ..
            } => {
                let url = match (url, host, database) {
                    (Some(url), _, _) => {
                        // URL takes precedence over individual fields
                        tracing::info!("Connecting to PostgreSQL using connection URL");
                        url.clone()
                    }
                    (None, Some(host), Some(database)) => {
                        tracing::info!(
                            host = %host,
                            port = port.unwrap_or(5432),
                            database = %database,
                            username = username.as_deref().unwrap_or("<none>"),
                            ssl_mode = ?ssl_mode,
                            "Connecting to PostgreSQL with individual parameters"
                        );
                        postgres_url(
                            host,
                            port.unwrap_or(5432),
                            username.as_deref(),
                            password.as_deref(),
                            database,
                            *ssl_mode,
                        )
                    }
                    _ => {
                        return Err(IndexError::Config(
                            "postgres config requires either 'url' or 'host' + 'database'"
                                .to_string(),
                        ));
                    }
                };
                Self::postgres(&url, config, *statement_timeout_ms).await
            }
        }
    }

    async fn sqlite(path: &Path, config: &IndexConfig) -> IndexResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    IndexError::Config(format!(
                        "cannot create index directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        install_default_drivers();
        let pool = AnyPoolOptions::new()
            .max_connections(config.max_connections())
            .acquire_timeout(config.acquire_timeout())
            // Prevent transient "database is locked" errors under concurrent access.
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    for pragma in SQLITE_PRAGMAS {
                        sqlx::query(pragma).execute(&mut *conn).await?;
                    }
                    Ok(())
                })
            })
            .connect(&format!("sqlite://{}?mode=rwc", path.display()))
            .await?;

        tracing::info!(path = %path.display(), "Opened SQLite index store");
        Ok(Self {
            pool,
            backend: Backend::Sqlite,
        })
    }

    async fn postgres(
        url: &str,
        config: &IndexConfig,
        statement_timeout_ms: Option<u64>,
    ) -> IndexResult<Self> {
        install_default_drivers();
        let mut options = AnyPoolOptions::new()
            .max_connections(config.max_connections())
            .acquire_timeout(config.acquire_timeout());

        // Long scans are bounded by the server-side statement timeout.
        if let Some(timeout_ms) = statement_timeout_ms {
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
            options = options.after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query(&format!("SET statement_timeout = {timeout_ms}"))
                        .execute(conn)
                        .await?;
                    Ok(())
                })
            });
        }

        let pool = options.connect(url).await?;
        Ok(Self {
            pool,
            backend: Backend::Postgres,
        })
    }

    /// Acquire a scoped connection, giving up if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> IndexResult<PoolConnection<Any>> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IndexError::Cancelled),
            conn = self.pool.acquire() => Ok(conn?),
        }
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &AnyPool {
        &self.pool
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> IndexResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self, timeout: Duration) {
        if tokio::time::timeout(timeout, self.pool.close()).await.is_err() {
            tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Timed out waiting for index connections to close"
            );
        }
    }
}

/// Build a PostgreSQL URL from individual parameters.
fn postgres_url(
    host: &str,
    port: u16,
    username: Option<&str>,
    password: Option<&str>,
    database: &str,
    ssl_mode: Option<PgSslMode>,
) -> String {
    let credentials = match (username, password) {
        (Some(user), Some(pass)) => format!(
            "{}:{}@",
            utf8_percent_encode(user, NON_ALPHANUMERIC),
            utf8_percent_encode(pass, NON_ALPHANUMERIC)
        ),
        (Some(user), None) => format!("{}@", utf8_percent_encode(user, NON_ALPHANUMERIC)),
        _ => String::new(),
    };
    let mut url = format!(
        "postgres://{credentials}{host}:{port}/{}",
        utf8_percent_encode(database, NON_ALPHANUMERIC)
    );
    if let Some(mode) = ssl_mode {
        url.push_str("?sslmode=");
        url.push_str(mode.as_str());
    }
    url
}
