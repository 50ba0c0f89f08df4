//! Deleted-instance table definitions per schema version.
//!
//! Creates the tombstone table as it looks at a given schema version. This is
//! used for local databases and tests; production schemas are upgraded by
//! the deployment tooling.

use crate::connection::{Backend, ConnectionFactory};
use crate::error::IndexResult;
use dicomidx_core::SchemaVersion;

const CREATE_DELETED_INSTANCE: &str = r#"
CREATE TABLE IF NOT EXISTS deleted_instance (
    partition_key BIGINT NOT NULL,
    study_instance_uid TEXT NOT NULL,
    series_instance_uid TEXT NOT NULL,
    sop_instance_uid TEXT NOT NULL,
    watermark BIGINT NOT NULL,
    deleted_date BIGINT NOT NULL,
    retry_count BIGINT NOT NULL DEFAULT 0,
    PRIMARY KEY (partition_key, study_instance_uid, series_instance_uid, sop_instance_uid, watermark)
)
"#;

const CREATE_RETRY_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_deleted_instance_retry ON deleted_instance(retry_count)";

/// Create or upgrade the deleted-instance table to `version`.
pub async fn apply(connections: &ConnectionFactory, version: SchemaVersion) -> IndexResult<()> {
    let pool = connections.pool();
    sqlx::query(CREATE_DELETED_INSTANCE).execute(pool).await?;
    sqlx::query(CREATE_RETRY_INDEX).execute(pool).await?;

    if version >= SchemaVersion::V35 {
        match connections.backend() {
            Backend::Postgres => {
                sqlx::query(
                    "ALTER TABLE deleted_instance ADD COLUMN IF NOT EXISTS original_watermark BIGINT",
                )
                .execute(pool)
                .await?;
            }
            Backend::Sqlite => {
                // SQLite has no ADD COLUMN IF NOT EXISTS.
                let present: i64 = sqlx::query_scalar(
                    "SELECT COUNT(*) FROM pragma_table_info('deleted_instance') WHERE name = 'original_watermark'",
                )
                .fetch_one(pool)
                .await?;
                if present == 0 {
                    sqlx::query("ALTER TABLE deleted_instance ADD COLUMN original_watermark BIGINT")
                        .execute(pool)
                        .await?;
                }
            }
        }
    }

    tracing::debug!(version = %version, "Deleted-instance schema applied");
    Ok(())
}
