//! Deleted-instance fixtures.

use dicomidx_core::VersionedInstanceIdentifier;
use dicomidx_index::{ConnectionFactory, IndexResult};

/// Default deletion date for fixtures (2023-11-14T22:13:20Z).
pub const DELETED_AT: i64 = 1_700_000_000;

/// A row to seed into the deleted-instance table.
#[derive(Clone, Debug)]
pub struct Tombstone {
    pub partition_key: i64,
    pub study_instance_uid: String,
    pub series_instance_uid: String,
    pub sop_instance_uid: String,
    pub watermark: i64,
    pub original_watermark: Option<i64>,
    pub retry_count: i64,
    pub deleted_date: i64,
}

#[allow(dead_code)]
impl Tombstone {
    pub fn new(study: &str, series: &str, sop: &str, watermark: i64) -> Self {
        Self {
            partition_key: 1,
            study_instance_uid: study.to_string(),
            series_instance_uid: series.to_string(),
            sop_instance_uid: sop.to_string(),
            watermark,
            original_watermark: None,
            retry_count: 0,
            deleted_date: DELETED_AT,
        }
    }

    /// The n-th instance of a synthetic study, zero-padded so that string
    /// order matches numeric order.
    pub fn numbered(n: usize) -> Self {
        Self::new(
            "1.2.840.1",
            "1.2.840.1.1",
            &format!("1.2.840.1.1.{n:05}"),
            n as i64 + 1,
        )
    }

    pub fn partition(mut self, partition_key: i64) -> Self {
        self.partition_key = partition_key;
        self
    }

    pub fn retries(mut self, retry_count: i64) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn original(mut self, original_watermark: i64) -> Self {
        self.original_watermark = Some(original_watermark);
        self
    }

    pub fn deleted_at(mut self, deleted_date: i64) -> Self {
        self.deleted_date = deleted_date;
        self
    }

    /// Identifier the index should report for this row.
    pub fn identifier(&self) -> VersionedInstanceIdentifier {
        VersionedInstanceIdentifier::new(
            self.study_instance_uid.clone(),
            self.series_instance_uid.clone(),
            self.sop_instance_uid.clone(),
            self.watermark,
            i32::try_from(self.partition_key).expect("fixture partition key fits in i32"),
        )
    }
}

/// Insert tombstones. Rows without an original watermark do not touch that
/// column, so they can be seeded into pre-lineage schemas.
pub async fn insert_tombstones(
    connections: &ConnectionFactory,
    tombstones: &[Tombstone],
) -> IndexResult<()> {
    for t in tombstones {
        match t.original_watermark {
            Some(original) => {
                sqlx::query(
                    r#"
                    INSERT INTO deleted_instance (
                        partition_key, study_instance_uid, series_instance_uid, sop_instance_uid,
                        watermark, deleted_date, retry_count, original_watermark
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(t.partition_key)
                .bind(&t.study_instance_uid)
                .bind(&t.series_instance_uid)
                .bind(&t.sop_instance_uid)
                .bind(t.watermark)
                .bind(t.deleted_date)
                .bind(t.retry_count)
                .bind(original)
                .execute(connections.pool())
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO deleted_instance (
                        partition_key, study_instance_uid, series_instance_uid, sop_instance_uid,
                        watermark, deleted_date, retry_count
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7)
                    "#,
                )
                .bind(t.partition_key)
                .bind(&t.study_instance_uid)
                .bind(&t.series_instance_uid)
                .bind(&t.sop_instance_uid)
                .bind(t.watermark)
                .bind(t.deleted_date)
                .bind(t.retry_count)
                .execute(connections.pool())
                .await?;
            }
        }
    }
    Ok(())
}

/// Retry count currently stored for an instance.
#[allow(dead_code)]
pub async fn retry_count(
    connections: &ConnectionFactory,
    id: &VersionedInstanceIdentifier,
) -> IndexResult<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT retry_count FROM deleted_instance
        WHERE partition_key = $1 AND study_instance_uid = $2 AND series_instance_uid = $3
          AND sop_instance_uid = $4 AND watermark = $5
        "#,
    )
    .bind(i64::from(id.partition_key))
    .bind(&id.study_instance_uid)
    .bind(&id.series_instance_uid)
    .bind(&id.sop_instance_uid)
    .bind(id.watermark)
    .fetch_one(connections.pool())
    .await?;
    Ok(count)
}

/// Total rows in the deleted-instance table.
#[allow(dead_code)]
pub async fn tombstone_count(connections: &ConnectionFactory) -> IndexResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deleted_instance")
        .fetch_one(connections.pool())
        .await?;
    Ok(count)
}
