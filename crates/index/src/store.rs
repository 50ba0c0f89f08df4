//! Index store contract and its schema-versioned implementation.

use crate::connection::ConnectionFactory;
use crate::deleted;
use crate::error::{IndexError, IndexResult};
use crate::ladder::{Binding, Operation, OperationTable};
use async_trait::async_trait;
use dicomidx_core::{InstanceMetadata, SchemaVersion, VersionedInstanceIdentifier};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

/// Read operations over the index, stable across schema versions.
#[async_trait]
pub trait IndexDataStore: Send + Sync {
    /// Schema version this store serves.
    fn version(&self) -> SchemaVersion;

    /// Check database connectivity.
    async fn health_check(&self) -> IndexResult<()>;

    /// Up to `batch_size` deleted instances whose retry count is below `max_retries`.
    async fn retrieve_deleted_instances(
        &self,
        batch_size: u32,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> IndexResult<Vec<VersionedInstanceIdentifier>>;

    /// Up to `batch_size` deleted instances whose retry count is below
    /// `max_retries`, each with its instance properties.
    ///
    /// A pure read: retry counters and tombstones are left untouched. The
    /// whole call fails if any row cannot be read.
    async fn retrieve_deleted_instances_with_properties(
        &self,
        batch_size: u32,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> IndexResult<Vec<InstanceMetadata>>;

    /// Number of deleted instances that reached the retry ceiling and are no
    /// longer cleaned up automatically.
    async fn retrieve_num_exhausted_deleted_instance_attempts(
        &self,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> IndexResult<i64>;

    /// Deletion date of the oldest deleted instance, if any remain.
    async fn get_oldest_deleted(
        &self,
        cancel: &CancellationToken,
    ) -> IndexResult<Option<OffsetDateTime>>;
}

/// Index store dispatching each operation through the ladder table of its
/// schema version.
pub struct VersionedIndexStore {
    connections: ConnectionFactory,
    operations: OperationTable,
}

impl VersionedIndexStore {
    pub fn new(connections: ConnectionFactory, version: SchemaVersion) -> Self {
        Self::with_operations(connections, OperationTable::for_version(version))
    }

    pub(crate) fn with_operations(
        connections: ConnectionFactory,
        operations: OperationTable,
    ) -> Self {
        Self {
            connections,
            operations,
        }
    }

    /// Operation bindings in force for this store.
    pub fn operations(&self) -> &OperationTable {
        &self.operations
    }

    /// A binding that serves a different operation never reaches a table
    /// slot; treat one as an unsupported operation.
    fn misbound(&self, operation: Operation, binding: Binding) -> IndexError {
        tracing::error!(
            operation = operation.as_str(),
            binding = binding.as_str(),
            version = %self.operations.version(),
            "Operation bound to a query for another operation"
        );
        IndexError::Unsupported {
            operation: operation.as_str(),
            version: self.operations.version(),
        }
    }

    fn trace<T>(
        &self,
        operation: Operation,
        batch_size: Option<u32>,
        max_retries: Option<u32>,
        result: IndexResult<T>,
        returned: impl Fn(&T) -> usize,
    ) -> IndexResult<T> {
        match &result {
            Ok(value) => tracing::debug!(
                operation = operation.as_str(),
                version = %self.operations.version(),
                batch_size,
                max_retries,
                returned = returned(value),
                "Index read completed"
            ),
            Err(IndexError::Cancelled) => tracing::debug!(
                operation = operation.as_str(),
                version = %self.operations.version(),
                "Index read cancelled"
            ),
            Err(e) => tracing::warn!(
                operation = operation.as_str(),
                version = %self.operations.version(),
                error = %e,
                "Index read failed"
            ),
        }
        result
    }
}

#[async_trait]
impl IndexDataStore for VersionedIndexStore {
    fn version(&self) -> SchemaVersion {
        self.operations.version()
    }

    async fn health_check(&self) -> IndexResult<()> {
        self.connections.health_check().await
    }

    async fn retrieve_deleted_instances(
        &self,
        batch_size: u32,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> IndexResult<Vec<VersionedInstanceIdentifier>> {
        let operation = Operation::RetrieveDeletedInstances;
        let binding = self.operations.require(operation)?;
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let result = match binding {
            Binding::IdentityScan => {
                deleted::identity_scan(&self.connections, batch_size, max_retries, cancel).await
            }
            Binding::PropertiesFromIdentityScan
            | Binding::LineageScan
            | Binding::ExhaustedCount
            | Binding::OldestDeletedDate => Err(self.misbound(operation, binding)),
        };
        self.trace(
            operation,
            Some(batch_size),
            Some(max_retries),
            result,
            Vec::len,
        )
    }

    async fn retrieve_deleted_instances_with_properties(
        &self,
        batch_size: u32,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> IndexResult<Vec<InstanceMetadata>> {
        let operation = Operation::RetrieveDeletedInstancesWithProperties;
        let binding = self.operations.require(operation)?;
        if batch_size == 0 {
            return Ok(Vec::new());
        }

        let result = match binding {
            Binding::PropertiesFromIdentityScan => {
                deleted::identity_scan(&self.connections, batch_size, max_retries, cancel)
                    .await
                    .map(|ids| ids.into_iter().map(InstanceMetadata::from).collect())
            }
            Binding::LineageScan => {
                deleted::lineage_scan(&self.connections, batch_size, max_retries, cancel).await
            }
            Binding::IdentityScan | Binding::ExhaustedCount | Binding::OldestDeletedDate => {
                Err(self.misbound(operation, binding))
            }
        };
        self.trace(
            operation,
            Some(batch_size),
            Some(max_retries),
            result,
            Vec::len,
        )
    }

    async fn retrieve_num_exhausted_deleted_instance_attempts(
        &self,
        max_retries: u32,
        cancel: &CancellationToken,
    ) -> IndexResult<i64> {
        let operation = Operation::RetrieveNumExhaustedDeletedInstanceAttempts;
        let binding = self.operations.require(operation)?;

        let result = match binding {
            Binding::ExhaustedCount => {
                deleted::exhausted_count(&self.connections, max_retries, cancel).await
            }
            Binding::IdentityScan
            | Binding::PropertiesFromIdentityScan
            | Binding::LineageScan
            | Binding::OldestDeletedDate => Err(self.misbound(operation, binding)),
        };
        self.trace(operation, None, Some(max_retries), result, |count| {
            usize::try_from(*count).unwrap_or(usize::MAX)
        })
    }

    async fn get_oldest_deleted(
        &self,
        cancel: &CancellationToken,
    ) -> IndexResult<Option<OffsetDateTime>> {
        let operation = Operation::GetOldestDeleted;
        let binding = self.operations.require(operation)?;

        let result = match binding {
            Binding::OldestDeletedDate => {
                deleted::oldest_deleted_date(&self.connections, cancel).await
            }
            Binding::IdentityScan
            | Binding::PropertiesFromIdentityScan
            | Binding::LineageScan
            | Binding::ExhaustedCount => Err(self.misbound(operation, binding)),
        };
        self.trace(operation, None, None, result, |oldest| {
            usize::from(oldest.is_some())
        })
    }
}
