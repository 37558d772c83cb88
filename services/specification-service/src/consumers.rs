//! Consumer keeping the local characteristic cache current.

use async_trait::async_trait;
use event_bus::{ConsumeError, EventHandler, MessageHeaders};
use event_schema::{check_version, DomainEvent, EventEnvelope};
use sqlx::PgPool;
use tracing::debug;

use crate::db;

/// Queue this service binds to the characteristic routing key.
pub const CACHE_SYNC_QUEUE: &str = "specification-service.characteristic-sync.queue";

pub struct CharacteristicCacheConsumer {
    pool: PgPool,
}

impl CharacteristicCacheConsumer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventHandler for CharacteristicCacheConsumer {
    async fn handle(
        &self,
        envelope: EventEnvelope,
        _headers: &MessageHeaders,
    ) -> Result<(), ConsumeError> {
        match &envelope.event {
            DomainEvent::CharacteristicCreated(payload)
            | DomainEvent::CharacteristicUpdated(payload) => {
                // Events may interleave across redeliveries; stale versions
                // must not regress the cache.
                let stored = db::cache::get(&self.pool, payload.id)
                    .await
                    .map_err(|e| ConsumeError::Transient(anyhow::anyhow!(e)))?;
                if let Some(existing) = stored {
                    if !check_version(envelope.entity_version, existing.version) {
                        debug!(
                            characteristic_id = %payload.id,
                            incoming = envelope.entity_version,
                            stored = existing.version,
                            "stale characteristic event, skipping"
                        );
                        return Ok(());
                    }
                }

                db::cache::upsert(&self.pool, payload.id, &payload.name, envelope.entity_version)
                    .await
                    .map_err(|e| ConsumeError::Transient(anyhow::anyhow!(e)))?;
                debug!(characteristic_id = %payload.id, "characteristic cache upserted");
            }
            DomainEvent::CharacteristicDeleted(entity) => {
                db::cache::remove(&self.pool, entity.id)
                    .await
                    .map_err(|e| ConsumeError::Transient(anyhow::anyhow!(e)))?;
                debug!(characteristic_id = %entity.id, "characteristic cache entry removed");
            }
            other => {
                debug!(event_type = other.event_type(), "ignoring event");
            }
        }

        Ok(())
    }
}
