//! Processed-event ledger for idempotent consumption
//!
//! Broker delivery is at-least-once: a crash between broker ack and row
//! update republishes events, and redeliveries happen on nack. Consumers
//! therefore record every handled `event_id` in a `processed_events` table
//! and skip anything already present, so side effects happen at most once
//! per event regardless of redeliveries.
//!
//! The check-and-record pair is race-safe: `mark_processed` is a conditional
//! insert (`ON CONFLICT DO NOTHING`), so of N concurrent consumers handling
//! the same `event_id` exactly one insert wins.

use chrono::Utc;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, info, warn};

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid event id: {0}")]
    InvalidEventId(String),

    #[error("invalid retention duration: {0}")]
    InvalidRetention(String),
}

/// Ledger of processed event ids, backed by the consumer's own database.
///
/// Thread-safe; share across tasks by cloning (the pool is internally
/// reference-counted).
#[derive(Clone)]
pub struct ProcessedEventLedger {
    pool: PgPool,
    retention: Duration,
}

impl ProcessedEventLedger {
    /// `retention` bounds ledger growth; entries older than it are removed
    /// by `cleanup_old_events`. Must comfortably exceed the broker's maximum
    /// redelivery window.
    pub fn new(pool: PgPool, retention: Duration) -> Self {
        Self { pool, retention }
    }

    /// Check whether an event was already processed.
    pub async fn is_processed(&self, event_id: &str) -> LedgerResult<bool> {
        Self::validate_event_id(event_id)?;

        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM processed_events WHERE event_id = $1
            ) AS processed
            "#,
        )
        .bind(event_id)
        .fetch_one(&self.pool)
        .await?;

        let processed: bool = row.try_get("processed")?;

        if processed {
            debug!(event_id = %event_id, "event already processed");
        }

        Ok(processed)
    }

    /// Record an event as processed.
    ///
    /// Returns `true` when this call inserted the entry, `false` when the
    /// event was already recorded (duplicate).
    pub async fn mark_processed(
        &self,
        event_id: &str,
        metadata: Option<serde_json::Value>,
    ) -> LedgerResult<bool> {
        Self::validate_event_id(event_id)?;

        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, metadata, processed_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(&metadata)
        .execute(&self.pool)
        .await?;

        let was_inserted = result.rows_affected() > 0;

        if was_inserted {
            debug!(event_id = %event_id, "event marked as processed");
        } else {
            debug!(event_id = %event_id, "event was already marked as processed");
        }

        Ok(was_inserted)
    }

    /// Delete ledger entries older than the retention window.
    ///
    /// Returns the number of deleted entries. Meant to run periodically from
    /// a background task.
    pub async fn cleanup_old_events(&self) -> LedgerResult<u64> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.retention)
                .map_err(|e| LedgerError::InvalidRetention(e.to_string()))?;

        let result = sqlx::query(
            r#"
            DELETE FROM processed_events
            WHERE processed_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        let deleted = result.rows_affected();
        if deleted > 0 {
            info!(deleted, cutoff = %cutoff, "cleaned up old processed events");
        }

        Ok(deleted)
    }

    /// Spawnable cleanup loop.
    pub async fn run_cleanup(&self, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            if let Err(e) = self.cleanup_old_events().await {
                warn!(error = %e, "processed-event cleanup failed");
            }
        }
    }

    fn validate_event_id(event_id: &str) -> LedgerResult<()> {
        if event_id.is_empty() {
            return Err(LedgerError::InvalidEventId(
                "event id cannot be empty".to_string(),
            ));
        }

        if event_id.len() > 255 {
            return Err(LedgerError::InvalidEventId(format!(
                "event id too long: {} characters (max 255)",
                event_id.len()
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_event_id_bounds() {
        assert!(ProcessedEventLedger::validate_event_id("event-123").is_ok());
        assert!(ProcessedEventLedger::validate_event_id(&"x".repeat(255)).is_ok());

        let err = ProcessedEventLedger::validate_event_id("").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidEventId(_)));

        let err = ProcessedEventLedger::validate_event_id(&"x".repeat(256)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidEventId(_)));
    }
}
