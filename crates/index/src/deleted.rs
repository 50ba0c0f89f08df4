//! Queries over the deleted-instance table.
//!
//! Every scan runs on its own pooled connection, streams rows from a
//! forward-only cursor, and checks for cancellation before each row.

use crate::connection::ConnectionFactory;
use crate::error::{IndexError, IndexResult};
use crate::models::{DeletedInstanceRow, DeletedInstanceWithPropertiesRow};
use dicomidx_core::{InstanceMetadata, VersionedInstanceIdentifier};
use futures::{Stream, TryStreamExt};
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;

const RETRIEVE_DELETED: &str = r#"
SELECT partition_key, study_instance_uid, series_instance_uid, sop_instance_uid, watermark
FROM deleted_instance
WHERE retry_count < $1
ORDER BY partition_key, study_instance_uid, series_instance_uid, sop_instance_uid, watermark
LIMIT $2
"#;

const RETRIEVE_DELETED_WITH_ORIGINAL_WATERMARK: &str = r#"
SELECT partition_key, study_instance_uid, series_instance_uid, sop_instance_uid, watermark, original_watermark
FROM deleted_instance
WHERE retry_count < $1
ORDER BY partition_key, study_instance_uid, series_instance_uid, sop_instance_uid, watermark
LIMIT $2
"#;

const COUNT_EXHAUSTED: &str = "SELECT COUNT(*) FROM deleted_instance WHERE retry_count >= $1";

const OLDEST_DELETED: &str = "SELECT MIN(deleted_date) FROM deleted_instance";

/// Upper bound on memory reserved up front for a batch.
const MAX_PREALLOCATED_ROWS: usize = 1024;

/// Identifiers of deleted instances below the retry ceiling.
pub async fn identity_scan(
    connections: &ConnectionFactory,
    batch_size: u32,
    max_retries: u32,
    cancel: &CancellationToken,
) -> IndexResult<Vec<VersionedInstanceIdentifier>> {
    let mut conn = connections.acquire(cancel).await?;
    let rows = sqlx::query_as::<_, DeletedInstanceRow>(RETRIEVE_DELETED)
        .bind(i64::from(max_retries))
        .bind(i64::from(batch_size))
        .fetch(&mut *conn);

    collect_rows(rows, batch_size, cancel, DeletedInstanceRow::into_identifier).await
}

/// Deleted instances below the retry ceiling, with their original watermark.
pub async fn lineage_scan(
    connections: &ConnectionFactory,
    batch_size: u32,
    max_retries: u32,
    cancel: &CancellationToken,
) -> IndexResult<Vec<InstanceMetadata>> {
    let mut conn = connections.acquire(cancel).await?;
    let rows =
        sqlx::query_as::<_, DeletedInstanceWithPropertiesRow>(RETRIEVE_DELETED_WITH_ORIGINAL_WATERMARK)
            .bind(i64::from(max_retries))
            .bind(i64::from(batch_size))
            .fetch(&mut *conn);

    collect_rows(
        rows,
        batch_size,
        cancel,
        DeletedInstanceWithPropertiesRow::into_metadata,
    )
    .await
}

/// Number of deleted instances whose retry count reached `max_retries`.
pub async fn exhausted_count(
    connections: &ConnectionFactory,
    max_retries: u32,
    cancel: &CancellationToken,
) -> IndexResult<i64> {
    let mut conn = connections.acquire(cancel).await?;
    let query = sqlx::query_scalar::<_, i64>(COUNT_EXHAUSTED)
        .bind(i64::from(max_retries))
        .fetch_one(&mut *conn);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IndexError::Cancelled),
        count = query => Ok(count?),
    }
}

/// Deletion date of the oldest deleted instance still tracked.
pub async fn oldest_deleted_date(
    connections: &ConnectionFactory,
    cancel: &CancellationToken,
) -> IndexResult<Option<OffsetDateTime>> {
    let mut conn = connections.acquire(cancel).await?;
    let query = sqlx::query_scalar::<_, Option<i64>>(OLDEST_DELETED).fetch_one(&mut *conn);

    let seconds = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(IndexError::Cancelled),
        seconds = query => seconds?,
    };

    seconds
        .map(|s| OffsetDateTime::from_unix_timestamp(s).map_err(IndexError::decode))
        .transpose()
}

/// Drain a row stream into domain values.
///
/// Any row error or mapping error fails the whole batch; nothing partial is
/// returned.
async fn collect_rows<R, T, S>(
    mut rows: S,
    batch_size: u32,
    cancel: &CancellationToken,
    map: impl Fn(R) -> IndexResult<T>,
) -> IndexResult<Vec<T>>
where
    S: Stream<Item = Result<R, sqlx::Error>> + Unpin,
{
    let mut results = Vec::with_capacity((batch_size as usize).min(MAX_PREALLOCATED_ROWS));
    loop {
        let row = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(IndexError::Cancelled),
            row = rows.try_next() => row?,
        };
        match row {
            Some(row) => results.push(map(row)?),
            None => break,
        }
    }
    Ok(results)
}
