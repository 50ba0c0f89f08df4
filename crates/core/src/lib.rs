//! Core domain types for the DICOM index store.
//!
//! This crate defines the data model shared by the index and its tooling:
//! - Versioned instance identifiers (study / series / SOP instance + watermark)
//! - Instance properties and the metadata pairs returned by index scans
//! - Schema versions known to this build and the dispatch policy over them
//! - Configuration for the index store and the reclamation workflow

pub mod config;
pub mod error;
pub mod instance;
pub mod schema_version;

pub use error::{Error, Result};
pub use instance::{
    DEFAULT_PARTITION_KEY, InstanceMetadata, InstanceProperties, VersionedInstanceIdentifier,
};
pub use schema_version::SchemaVersion;
