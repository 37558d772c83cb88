//! # Transactional outbox
//!
//! Guarantees that a domain mutation and the event describing it are
//! persisted atomically: the event is written to an `outbox` table inside
//! the same database transaction as the entity change, and a background
//! dispatcher later moves it to the broker. This gives **at-least-once**
//! delivery even when:
//!
//! - the service crashes after commit but before publishing
//! - the broker is temporarily unavailable
//! - the dispatcher crashes mid-drain (state lives in the row)
//!
//! ## Row lifecycle
//!
//! `PENDING → SENT` once the broker has durably acknowledged the message;
//! `PENDING → FAILED` on a terminal logical error (unparseable payload or an
//! exhausted retry budget on a non-transport failure). No other transitions
//! exist, and after the insert only the dispatcher mutates a row.
//!
//! ## Usage
//!
//! Writers insert rows with [`outbox_event!`] inside their transaction:
//!
//! ```rust,no_run
//! use transactional_outbox::{outbox_event, OutboxRepository, SqlxOutboxRepository};
//! use event_schema::{events::CharacteristicPayload, DomainEvent};
//! # async fn example(pool: sqlx::PgPool, outbox: SqlxOutboxRepository, payload: CharacteristicPayload) -> Result<(), Box<dyn std::error::Error>> {
//! let mut tx = pool.begin().await?;
//! // ... mutate the entity in the same transaction ...
//! outbox_event!(&mut tx, &outbox, DomainEvent::CharacteristicCreated(payload), 1)?;
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```
//!
//! The process entry point owns one [`OutboxDispatcher`] per writer and
//! spawns [`OutboxDispatcher::run`] as a supervised task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

mod dispatcher;
mod error;
pub mod macros;
mod repository;

pub use dispatcher::{DispatcherConfig, DrainOutcome, OutboxDispatcher, NOTIFY_CHANNEL};
pub use error::{OutboxError, OutboxResult, PublishError};
pub use repository::SqlxOutboxRepository;

use async_trait::async_trait;
use event_schema::EventEnvelope;
use sqlx::{Postgres, Transaction};

/// Delivery status of an outbox row, stored as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutboxStatus {
    Pending,
    Sent,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::Sent => "SENT",
            OutboxStatus::Failed => "FAILED",
        }
    }
}

impl std::str::FromStr for OutboxStatus {
    type Err = OutboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(OutboxStatus::Pending),
            "SENT" => Ok(OutboxStatus::Sent),
            "FAILED" => Ok(OutboxStatus::Failed),
            other => Err(OutboxError::InvalidStatus(other.to_string())),
        }
    }
}

/// A single outgoing event, co-located with the entity data it describes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub id: Uuid,
    /// Routing key the payload is published under
    pub topic: String,
    /// Full event envelope as JSON
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl OutboxRecord {
    /// Build a pending record from an event envelope. The topic is derived
    /// from the event family's routing key.
    pub fn for_event(envelope: &EventEnvelope) -> OutboxResult<Self> {
        Ok(Self {
            id: Uuid::new_v4(),
            topic: envelope.routing_key().to_string(),
            payload: serde_json::to_value(envelope)?,
            status: OutboxStatus::Pending,
            created_at: Utc::now(),
            processed_at: None,
            error_message: None,
        })
    }
}

/// Repository for outbox rows in the writer's own database.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    /// Insert a record within an open transaction, so entity mutation and
    /// event creation commit or abort together.
    async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        record: &OutboxRecord,
    ) -> OutboxResult<()>;

    /// Pending rows in insertion order (`created_at` ascending).
    async fn fetch_pending(&self, limit: i64) -> OutboxResult<Vec<OutboxRecord>>;

    /// Mark a row SENT and stamp `processed_at`.
    async fn mark_sent(&self, record_id: Uuid) -> OutboxResult<()>;

    /// Mark a row FAILED with the terminal error message.
    async fn mark_failed(&self, record_id: Uuid, error: &str) -> OutboxResult<()>;

    /// Pending count and age of the oldest pending row in seconds
    /// (0 when nothing is pending).
    async fn pending_stats(&self) -> OutboxResult<(i64, i64)>;
}

/// Publisher used by the dispatcher to hand rows to the broker.
#[async_trait]
pub trait OutboxPublisher: Send + Sync {
    /// Publish the envelope under the given routing key. `Ok` must mean the
    /// broker durably accepted the message.
    async fn publish(&self, topic: &str, event: &EventEnvelope) -> Result<(), PublishError>;
}

#[async_trait]
impl OutboxPublisher for event_bus::EventBus {
    async fn publish(&self, topic: &str, event: &EventEnvelope) -> Result<(), PublishError> {
        event_bus::EventBus::publish(self, topic, event)
            .await
            .map_err(|e| {
                if e.is_transport() {
                    PublishError::Transport(e.to_string())
                } else {
                    PublishError::Terminal(e.to_string())
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_schema::events::EntityRef;
    use event_schema::DomainEvent;

    #[test]
    fn record_for_event_derives_topic_and_defaults() {
        let envelope = EventEnvelope::new(
            DomainEvent::SpecificationDeleted(EntityRef { id: Uuid::new_v4() }),
            4,
        );
        let record = OutboxRecord::for_event(&envelope).unwrap();

        assert_eq!(record.topic, "resource.specifications.events");
        assert_eq!(record.status, OutboxStatus::Pending);
        assert!(record.processed_at.is_none());
        assert!(record.error_message.is_none());
        assert_eq!(record.payload["event_type"], "SpecificationDeleted");
        assert_eq!(record.payload["entity_version"], 4);
    }

    #[test]
    fn status_round_trips_as_text() {
        assert_eq!(OutboxStatus::Pending.as_str(), "PENDING");
        let decoded: OutboxStatus = serde_json::from_str("\"SENT\"").unwrap();
        assert_eq!(decoded, OutboxStatus::Sent);
    }
}
