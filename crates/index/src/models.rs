//! Row shapes read from the deleted-instance table.

use crate::error::{IndexError, IndexResult};
use dicomidx_core::{InstanceMetadata, InstanceProperties, VersionedInstanceIdentifier};
use sqlx::FromRow;

/// Identifying columns of a deleted instance, in select order.
#[derive(Debug, Clone, FromRow)]
pub struct DeletedInstanceRow {
    pub partition_key: i64,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
    pub watermark: i64,
}

impl DeletedInstanceRow {
    /// Convert into a domain identifier.
    ///
    /// Fails with a data store fault if the partition key does not fit.
    pub fn into_identifier(self) -> IndexResult<VersionedInstanceIdentifier> {
        let partition_key = i32::try_from(self.partition_key).map_err(IndexError::decode)?;
        Ok(VersionedInstanceIdentifier::new(
            self.study_instance_uid,
            self.series_instance_uid,
            self.sop_instance_uid,
            self.watermark,
            partition_key,
        ))
    }
}

/// Deleted instance with its lineage column (schema V35+).
#[derive(Debug, Clone, FromRow)]
pub struct DeletedInstanceWithPropertiesRow {
    #[sqlx(flatten)]
    pub instance: DeletedInstanceRow,
    pub original_watermark: Option<i64>,
}

impl DeletedInstanceWithPropertiesRow {
    pub fn into_metadata(self) -> IndexResult<InstanceMetadata> {
        Ok(InstanceMetadata::new(
            self.instance.into_identifier()?,
            InstanceProperties {
                original_version: self.original_watermark,
            },
        ))
    }
}
