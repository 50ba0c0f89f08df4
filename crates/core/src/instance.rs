//! Instance identity and metadata types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Partition key used when data partitioning is disabled.
pub const DEFAULT_PARTITION_KEY: i32 = 1;

/// Identifies one version of a stored instance.
///
/// The 5-tuple of partition key, the three UIDs and the watermark is unique
/// and never changes once assigned. UIDs are opaque to the index.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionedInstanceIdentifier {
    pub partition_key: i32,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
    pub watermark: i64,
}

impl VersionedInstanceIdentifier {
    /// Create an identifier from its components.
    pub fn new(
        study_instance_uid: impl Into<String>,
        series_instance_uid: impl Into<String>,
        sop_instance_uid: impl Into<String>,
        watermark: i64,
        partition_key: i32,
    ) -> Self {
        Self {
            partition_key,
            study_instance_uid: study_instance_uid.into(),
            series_instance_uid: series_instance_uid.into(),
            sop_instance_uid: sop_instance_uid.into(),
            watermark,
        }
    }
}

impl fmt::Display for VersionedInstanceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}@{}",
            self.partition_key,
            self.study_instance_uid,
            self.series_instance_uid,
            self.sop_instance_uid,
            self.watermark
        )
    }
}

/// Optional metadata attached to an instance version.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceProperties {
    /// Watermark of the version this one replaced, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_version: Option<i64>,
}

/// An instance version together with its properties.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceMetadata {
    pub identifier: VersionedInstanceIdentifier,
    pub properties: InstanceProperties,
}

impl InstanceMetadata {
    pub fn new(identifier: VersionedInstanceIdentifier, properties: InstanceProperties) -> Self {
        Self {
            identifier,
            properties,
        }
    }
}

impl From<VersionedInstanceIdentifier> for InstanceMetadata {
    /// Metadata without lineage.
    fn from(identifier: VersionedInstanceIdentifier) -> Self {
        Self::new(identifier, InstanceProperties::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_display() {
        let id = VersionedInstanceIdentifier::new("1.2.3", "1.2.3.4", "1.2.3.4.5", 42, 7);
        assert_eq!(id.to_string(), "7/1.2.3/1.2.3.4/1.2.3.4.5@42");
    }

    #[test]
    fn test_metadata_from_identifier_has_no_lineage() {
        let id = VersionedInstanceIdentifier::new("S1", "SE1", "SOP1", 42, DEFAULT_PARTITION_KEY);
        let metadata = InstanceMetadata::from(id.clone());
        assert_eq!(metadata.identifier, id);
        assert_eq!(metadata.properties.original_version, None);
    }

    #[test]
    fn test_properties_omit_missing_original_version() {
        let json = serde_json::to_string(&InstanceProperties::default()).unwrap();
        assert_eq!(json, "{}");

        let json = serde_json::to_string(&InstanceProperties {
            original_version: Some(7),
        })
        .unwrap();
        assert_eq!(json, r#"{"original_version":7}"#);
    }
}
