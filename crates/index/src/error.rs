//! Index store error types.

use thiserror::Error;

/// Index store operation errors.
#[derive(Debug, Error)]
pub enum IndexError {
    /// Any failure raised by the relational layer: connection acquisition,
    /// statement execution, or row materialization.
    #[error("data store error: {0}")]
    DataStore(#[from] sqlx::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("{operation} is not supported by schema version {version}")]
    Unsupported {
        operation: &'static str,
        version: dicomidx_core::SchemaVersion,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl IndexError {
    /// Whether the reclamation workflow may retry the call later.
    ///
    /// Data store faults are transient from the caller's point of view;
    /// cancellation and contract errors are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DataStore(_))
    }

    /// Wrap a row that could not be turned into a domain value.
    pub(crate) fn decode(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::DataStore(sqlx::Error::Decode(Box::new(err)))
    }
}

impl From<dicomidx_core::Error> for IndexError {
    fn from(e: dicomidx_core::Error) -> Self {
        IndexError::Config(e.to_string())
    }
}

/// Result type for index operations.
pub type IndexResult<T> = std::result::Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;
    use dicomidx_core::SchemaVersion;

    #[test]
    fn test_only_data_store_faults_are_retryable() {
        assert!(IndexError::DataStore(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!IndexError::Cancelled.is_retryable());
        assert!(
            !IndexError::Unsupported {
                operation: "get_oldest_deleted",
                version: SchemaVersion::V1,
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_unsupported_message() {
        let err = IndexError::Unsupported {
            operation: "get_oldest_deleted",
            version: SchemaVersion::V1,
        };
        assert_eq!(
            err.to_string(),
            "get_oldest_deleted is not supported by schema version V1"
        );
    }

    #[test]
    fn test_decode_keeps_source() {
        let source = i32::try_from(i64::MAX).unwrap_err();
        let err = IndexError::decode(source);
        assert!(matches!(err, IndexError::DataStore(sqlx::Error::Decode(_))));
        assert!(std::error::Error::source(&err).is_some());
    }
}
