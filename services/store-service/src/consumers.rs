//! Event-driven projection.
//!
//! One durable queue per routing key feeds this handler. Processing is
//! ledger-first: a known `event_id` is acknowledged without side effects;
//! otherwise the event is applied, ledgered and acknowledged. Transient
//! failures leave the ledger untouched and nack the message, so redelivery
//! retries the whole step.

use async_trait::async_trait;
use event_bus::{ConsumeError, EventHandler, MessageHeaders};
use event_schema::{DomainEvent, EventEnvelope};
use idempotent_consumer::ProcessedEventLedger;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::RefEntity;
use crate::service::ProjectionService;

/// Queue name for a routing key, one per (service, routing-key) pair.
pub fn queue_for(routing_key: &str) -> String {
    format!("store-service.{routing_key}.queue")
}

pub struct ProjectionHandler {
    service: Arc<ProjectionService>,
    ledger: ProcessedEventLedger,
}

impl ProjectionHandler {
    pub fn new(service: Arc<ProjectionService>, ledger: ProcessedEventLedger) -> Self {
        Self { service, ledger }
    }

    async fn apply(&self, event: &DomainEvent) -> Result<(), ConsumeError> {
        match event {
            DomainEvent::OfferingPublished(payload) => {
                self.service
                    .sync_offering(payload.id)
                    .await
                    .map_err(|e| ConsumeError::Transient(anyhow::anyhow!(e)))?;
            }
            DomainEvent::OfferingRetired(payload) => {
                self.service
                    .remove_offering(payload.id)
                    .await
                    .map_err(|e| ConsumeError::Transient(anyhow::anyhow!(e)))?;
            }
            DomainEvent::CharacteristicUpdated(payload) => {
                self.fan_out(RefEntity::Characteristic, payload.id).await?;
            }
            DomainEvent::CharacteristicDeleted(entity) => {
                self.fan_out(RefEntity::Characteristic, entity.id).await?;
            }
            DomainEvent::SpecificationUpdated(payload) => {
                self.fan_out(RefEntity::Specification, payload.id).await?;
            }
            DomainEvent::SpecificationDeleted(entity) => {
                self.fan_out(RefEntity::Specification, entity.id).await?;
            }
            DomainEvent::PriceUpdated(payload) => {
                self.fan_out(RefEntity::Price, payload.id).await?;
            }
            DomainEvent::PriceDeleted(entity) => {
                self.fan_out(RefEntity::Price, entity.id).await?;
            }
            other => {
                debug!(event_type = other.event_type(), "no projection for event");
            }
        }
        Ok(())
    }

    /// Dependency-aware re-composition: rebuild every stored document that
    /// references the changed entity.
    async fn fan_out(&self, entity: RefEntity, entity_id: Uuid) -> Result<(), ConsumeError> {
        let affected = self
            .service
            .affected_offerings(entity, entity_id)
            .await
            .map_err(|e| ConsumeError::Transient(anyhow::anyhow!(e)))?;

        if affected.is_empty() {
            debug!(?entity, entity_id = %entity_id, "no documents reference changed entity");
            return Ok(());
        }

        info!(
            ?entity,
            entity_id = %entity_id,
            count = affected.len(),
            "re-composing offerings after reference change"
        );

        for offering_id in affected {
            self.service
                .sync_offering(offering_id)
                .await
                .map_err(|e| ConsumeError::Transient(anyhow::anyhow!(e)))?;
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for ProjectionHandler {
    async fn handle(
        &self,
        envelope: EventEnvelope,
        _headers: &MessageHeaders,
    ) -> Result<(), ConsumeError> {
        let event_id = envelope.event_id.to_string();

        let processed = self
            .ledger
            .is_processed(&event_id)
            .await
            .map_err(|e| ConsumeError::Transient(anyhow::anyhow!(e)))?;
        if processed {
            debug!(event_id = %event_id, "event already processed, skipping");
            return Ok(());
        }

        self.apply(&envelope.event).await?;

        self.ledger
            .mark_processed(
                &event_id,
                Some(serde_json::json!({
                    "event_type": envelope.event.event_type(),
                    "entity_version": envelope.entity_version,
                })),
            )
            .await
            .map_err(|e| ConsumeError::Transient(anyhow::anyhow!(e)))?;

        Ok(())
    }
}
