//! Schema-version ladder.
//!
//! Each [`LadderEntry`] lists the operation bindings a schema version
//! introduces or replaces. The bindings in force for a version are the fold of
//! every entry at or below it, so an entry that does not mention an operation
//! inherits whatever the previous entries bound.

use crate::error::{IndexError, IndexResult};
use dicomidx_core::SchemaVersion;

/// Operations on the index store contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    RetrieveDeletedInstances,
    RetrieveDeletedInstancesWithProperties,
    RetrieveNumExhaustedDeletedInstanceAttempts,
    GetOldestDeleted,
}

impl Operation {
    pub const COUNT: usize = 4;

    pub const ALL: [Operation; Self::COUNT] = [
        Self::RetrieveDeletedInstances,
        Self::RetrieveDeletedInstancesWithProperties,
        Self::RetrieveNumExhaustedDeletedInstanceAttempts,
        Self::GetOldestDeleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RetrieveDeletedInstances => "retrieve_deleted_instances",
            Self::RetrieveDeletedInstancesWithProperties => {
                "retrieve_deleted_instances_with_properties"
            }
            Self::RetrieveNumExhaustedDeletedInstanceAttempts => {
                "retrieve_num_exhausted_deleted_instance_attempts"
            }
            Self::GetOldestDeleted => "get_oldest_deleted",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Query implementation an operation is bound to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Binding {
    /// Identifying columns of eligible deleted instances.
    IdentityScan,
    /// Identity scan wrapped with empty properties (no lineage column yet).
    PropertiesFromIdentityScan,
    /// Identifying columns plus `original_watermark`.
    LineageScan,
    /// Count of deleted instances at or over the retry ceiling.
    ExhaustedCount,
    /// Earliest deletion date.
    OldestDeletedDate,
}

impl Binding {
    /// The operation this implementation serves.
    pub fn operation(&self) -> Operation {
        match self {
            Self::IdentityScan => Operation::RetrieveDeletedInstances,
            Self::PropertiesFromIdentityScan | Self::LineageScan => {
                Operation::RetrieveDeletedInstancesWithProperties
            }
            Self::ExhaustedCount => Operation::RetrieveNumExhaustedDeletedInstanceAttempts,
            Self::OldestDeletedDate => Operation::GetOldestDeleted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdentityScan => "identity_scan",
            Self::PropertiesFromIdentityScan => "properties_from_identity_scan",
            Self::LineageScan => "lineage_scan",
            Self::ExhaustedCount => "exhausted_count",
            Self::OldestDeletedDate => "oldest_deleted_date",
        }
    }
}

/// Bindings introduced or replaced by one schema version.
#[derive(Debug)]
pub struct LadderEntry {
    pub version: SchemaVersion,
    pub overrides: &'static [Binding],
}

/// Every ladder entry, ascending by version.
pub const LADDER: &[LadderEntry] = &[
    LadderEntry {
        version: SchemaVersion::V1,
        overrides: &[Binding::IdentityScan, Binding::PropertiesFromIdentityScan],
    },
    LadderEntry {
        version: SchemaVersion::V6,
        overrides: &[Binding::ExhaustedCount, Binding::OldestDeletedDate],
    },
    LadderEntry {
        version: SchemaVersion::V33,
        overrides: &[],
    },
    LadderEntry {
        version: SchemaVersion::V35,
        overrides: &[Binding::LineageScan],
    },
    LadderEntry {
        version: SchemaVersion::V36,
        overrides: &[],
    },
];

/// A binding together with the version whose entry installed it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bound {
    pub binding: Binding,
    pub since: SchemaVersion,
}

/// Operation bindings in force at one schema version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationTable {
    version: SchemaVersion,
    bindings: [Option<Bound>; Operation::COUNT],
}

impl OperationTable {
    /// Fold the ladder up to and including `version`.
    pub fn for_version(version: SchemaVersion) -> Self {
        Self::fold(LADDER, version)
    }

    /// Fold `entries` (ascending by version) up to and including `version`.
    ///
    /// Each binding lands in the slot of the operation it serves, so
    /// `get(op)` only ever returns a binding whose `operation()` is `op`.
    pub(crate) fn fold(entries: &[LadderEntry], version: SchemaVersion) -> Self {
        let mut bindings = [None; Operation::COUNT];
        for entry in entries.iter().take_while(|entry| entry.version <= version) {
            for binding in entry.overrides {
                bindings[binding.operation().index()] = Some(Bound {
                    binding: *binding,
                    since: entry.version,
                });
            }
        }
        Self { version, bindings }
    }

    pub fn version(&self) -> SchemaVersion {
        self.version
    }

    /// The binding for `operation`, if this version supports it.
    pub fn get(&self, operation: Operation) -> Option<Bound> {
        self.bindings[operation.index()]
    }

    /// The binding for `operation`, or an unsupported-operation error.
    pub fn require(&self, operation: Operation) -> IndexResult<Binding> {
        self.get(operation)
            .map(|bound| bound.binding)
            .ok_or(IndexError::Unsupported {
                operation: operation.as_str(),
                version: self.version,
            })
    }

    /// All operations with their bindings, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Operation, Option<Bound>)> + '_ {
        Operation::ALL.iter().map(|op| (*op, self.get(*op)))
    }
}
