//! Index schema versions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A generation of the deployed index schema.
///
/// Only versions that changed the deleted-instance surface, or that a ladder
/// entry is declared for, are listed. Ordering follows the numeric version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum SchemaVersion {
    /// Deleted-instance table with retry counter.
    V1 = 1,
    /// Deletion date exposed for operational queries.
    V6 = 6,
    V33 = 33,
    /// Original watermark lineage column on deleted instances.
    V35 = 35,
    V36 = 36,
}

impl SchemaVersion {
    /// All known versions in ascending order.
    pub const ALL: [SchemaVersion; 5] = [Self::V1, Self::V6, Self::V33, Self::V35, Self::V36];

    /// Oldest version this build can serve.
    pub const MIN: SchemaVersion = Self::V1;

    /// Newest version this build knows about.
    pub const LATEST: SchemaVersion = Self::V36;

    /// Numeric value of the version.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Resolve the schema version reported by a deployment.
    ///
    /// Picks the highest known version at or below `raw`. Values newer than
    /// [`SchemaVersion::LATEST`] resolve to `LATEST`; values older than
    /// [`SchemaVersion::MIN`] are rejected.
    pub fn resolve(raw: i32) -> crate::Result<Self> {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|v| v.as_i32() <= raw)
            .ok_or(crate::Error::SchemaVersionTooOld {
                version: raw,
                min: Self::MIN.as_i32(),
            })
    }

    /// Whether `raw` is newer than anything this build knows about.
    pub fn is_beyond_latest(raw: i32) -> bool {
        raw > Self::LATEST.as_i32()
    }
}

impl TryFrom<i32> for SchemaVersion {
    type Error = crate::Error;

    /// Exact conversion; use [`SchemaVersion::resolve`] for the dispatch policy.
    fn try_from(value: i32) -> crate::Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|v| v.as_i32() == value)
            .ok_or_else(|| crate::Error::UnknownSchemaVersion {
                version: value,
                known: Self::ALL
                    .iter()
                    .map(|v| v.as_i32().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

impl From<SchemaVersion> for i32 {
    fn from(version: SchemaVersion) -> Self {
        version.as_i32()
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.as_i32())
    }
}
