//! Schema-versioned DICOM index store.
//!
//! This crate provides the read side of the instance index:
//! - The operation contract shared by every schema version
//! - The schema-version ladder that binds each operation per version
//! - Deleted-instance scans used by the reclamation workflow
//! - Scoped, cancellable connections to SQLite or PostgreSQL

pub mod connection;
pub mod deleted;
pub mod error;
pub mod ladder;
pub mod models;
pub mod schema;
pub mod store;

pub use connection::{Backend, ConnectionFactory};
pub use error::{IndexError, IndexResult};
pub use ladder::{Binding, Bound, LADDER, LadderEntry, Operation, OperationTable};
pub use store::{IndexDataStore, VersionedIndexStore};

use dicomidx_core::SchemaVersion;
use dicomidx_core::config::{IndexConfig, SchemaConfig};
use std::sync::Arc;

/// Resolve the configured schema version through the dispatch policy.
///
/// Picks the highest known version at or below the configured one. A
/// deployment newer than this build is served with the newest known entry.
pub fn resolve_schema_version(config: &SchemaConfig) -> IndexResult<SchemaVersion> {
    let version = SchemaVersion::resolve(config.version)?;
    if SchemaVersion::is_beyond_latest(config.version) {
        tracing::warn!(
            configured = config.version,
            serving = %version,
            "Schema version is newer than this build; serving with the newest known ladder entry"
        );
    } else if version.as_i32() != config.version {
        tracing::info!(
            configured = config.version,
            serving = %version,
            "No ladder entry for configured schema version; using the closest earlier entry"
        );
    }
    Ok(version)
}

/// Create an index store from configuration.
pub async fn from_config(
    config: &IndexConfig,
    schema: &SchemaConfig,
) -> IndexResult<Arc<dyn IndexDataStore>> {
    let version = resolve_schema_version(schema)?;
    let connections = ConnectionFactory::from_config(config).await?;
    tracing::info!(version = %version, "Index store initialized");
    Ok(Arc::new(VersionedIndexStore::new(connections, version)) as Arc<dyn IndexDataStore>)
}
