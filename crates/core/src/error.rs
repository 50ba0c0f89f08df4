//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown schema version {version} (known versions: {known})")]
    UnknownSchemaVersion { version: i32, known: String },

    #[error("schema version {version} predates the oldest supported version {min}")]
    SchemaVersionTooOld { version: i32, min: i32 },

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
