//! Index store test utilities.

use dicomidx_core::SchemaVersion;
use dicomidx_core::config::IndexConfig;
use dicomidx_index::{
    ConnectionFactory, IndexDataStore, IndexError, IndexResult, VersionedIndexStore, schema,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;

/// Stable prefix for Docker/container startup failures in Postgres test setup.
/// Tests use this marker to decide whether to skip due to unavailable Docker.
pub const POSTGRES_CONTAINER_START_ERR_PREFIX: &str = "postgres-container-start:";

/// A SQLite-backed test index that cleans up on drop.
#[allow(dead_code)]
pub struct TestIndex {
    pub connections: ConnectionFactory,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestIndex {
    /// Create a test index with the deleted-instance table at `version`.
    pub async fn new(version: SchemaVersion) -> IndexResult<Self> {
        Self::with_max_connections(version, 4).await
    }

    pub async fn with_max_connections(
        version: SchemaVersion,
        max_connections: u32,
    ) -> IndexResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let config = IndexConfig::Sqlite {
            path: temp_dir.path().join("index.db"),
            max_connections,
            acquire_timeout_secs: 30,
        };
        let connections = ConnectionFactory::from_config(&config).await?;
        schema::apply(&connections, version).await?;

        Ok(Self {
            connections,
            _temp_dir: temp_dir,
        })
    }

    /// A store dispatching through the ladder table of `version`.
    pub fn store(&self, version: SchemaVersion) -> Arc<dyn IndexDataStore> {
        Arc::new(VersionedIndexStore::new(self.connections.clone(), version))
    }

    pub fn versioned(&self, version: SchemaVersion) -> VersionedIndexStore {
        VersionedIndexStore::new(self.connections.clone(), version)
    }
}

/// Wait until every pooled connection is back in the pool.
#[allow(dead_code)]
pub async fn wait_for_idle(connections: &ConnectionFactory) {
    let pool = connections.pool();
    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        while pool.num_idle() < pool.size() as usize {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(
        settled.is_ok(),
        "connections not returned to pool: size={}, idle={}",
        pool.size(),
        pool.num_idle()
    );
}

/// PostgreSQL test index that manages a testcontainer.
#[allow(dead_code)]
pub struct PostgresTestIndex {
    pub connections: ConnectionFactory,
    _container: ContainerAsync<Postgres>,
}

#[allow(dead_code)]
impl PostgresTestIndex {
    /// Start a PostgreSQL container and create the deleted-instance table at `version`.
    pub async fn new(version: SchemaVersion) -> IndexResult<Self> {
        let container = Postgres::default()
            .with_tag("15-alpine")
            .start()
            .await
            .map_err(|e| {
                IndexError::Config(format!(
                    "{} Failed to start PostgreSQL container: {e}",
                    POSTGRES_CONTAINER_START_ERR_PREFIX
                ))
            })?;

        let host = container.get_host().await.expect("Failed to get host");
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        // Default credentials from testcontainers-modules postgres
        let url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

        let connections = ConnectionFactory::from_config(&IndexConfig::postgres_url(url)).await?;
        schema::apply(&connections, version).await?;

        Ok(Self {
            connections,
            _container: container,
        })
    }

    pub fn store(&self, version: SchemaVersion) -> Arc<dyn IndexDataStore> {
        Arc::new(VersionedIndexStore::new(self.connections.clone(), version))
    }
}
