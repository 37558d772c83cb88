//! SQLx-backed outbox repository.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{OutboxError, OutboxRecord, OutboxRepository, OutboxResult, OutboxStatus};

/// PostgreSQL implementation of [`OutboxRepository`].
pub struct SqlxOutboxRepository {
    pool: PgPool,
}

impl SqlxOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: sqlx::postgres::PgRow) -> OutboxResult<OutboxRecord> {
    let status_text: String = row.try_get("status")?;
    Ok(OutboxRecord {
        id: row.try_get("id")?,
        topic: row.try_get("topic")?,
        payload: row.try_get("payload")?,
        status: OutboxStatus::from_str(&status_text)?,
        created_at: row.try_get("created_at")?,
        processed_at: row.try_get("processed_at")?,
        error_message: row.try_get("error_message")?,
    })
}

#[async_trait]
impl OutboxRepository for SqlxOutboxRepository {
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: &OutboxRecord,
    ) -> OutboxResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox (id, topic, payload, status, created_at, processed_at, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(&record.topic)
        .bind(&record.payload)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.processed_at)
        .bind(&record.error_message)
        .execute(&mut **tx)
        .await?;

        debug!(
            record_id = %record.id,
            topic = %record.topic,
            "event inserted into outbox"
        );

        Ok(())
    }

    async fn fetch_pending(&self, limit: i64) -> OutboxResult<Vec<OutboxRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, topic, payload, status, created_at, processed_at, error_message
            FROM outbox
            WHERE status = 'PENDING'
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(record_from_row).collect()
    }

    async fn mark_sent(&self, record_id: Uuid) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox
            SET status = 'SENT', processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(record_id = %record_id, "outbox record not found when marking sent");
            return Err(OutboxError::RecordNotFound(record_id));
        }

        debug!(record_id = %record_id, "outbox record marked sent");
        Ok(())
    }

    async fn mark_failed(&self, record_id: Uuid, error: &str) -> OutboxResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE outbox
            SET status = 'FAILED', error_message = $2
            WHERE id = $1
            "#,
        )
        .bind(record_id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            warn!(record_id = %record_id, "outbox record not found when marking failed");
            return Err(OutboxError::RecordNotFound(record_id));
        }

        warn!(record_id = %record_id, error = %error, "outbox record marked failed");
        Ok(())
    }

    async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*)::BIGINT AS pending,
                COALESCE(EXTRACT(EPOCH FROM (NOW() - MIN(created_at)))::BIGINT, 0) AS age_seconds
            FROM outbox
            WHERE status = 'PENDING'
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let pending: i64 = row.try_get("pending").unwrap_or(0);
        let age: i64 = row.try_get("age_seconds").unwrap_or(0);
        Ok((pending, age))
    }
}
