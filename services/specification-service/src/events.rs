//! Outbox events emitted by this writer.

use event_schema::events::EntityRef;
use event_schema::DomainEvent;
use sqlx::{Postgres, Transaction};
use transactional_outbox::{outbox_event, OutboxResult, SqlxOutboxRepository};
use uuid::Uuid;

use crate::models::Specification;

pub async fn specification_created(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    spec: &Specification,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::SpecificationCreated(spec.to_payload()),
        spec.version,
        correlation_id
    )
}

pub async fn specification_updated(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    spec: &Specification,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::SpecificationUpdated(spec.to_payload()),
        spec.version,
        correlation_id
    )
}

pub async fn specification_deleted(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    spec_id: Uuid,
    last_version: i64,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::SpecificationDeleted(EntityRef { id: spec_id }),
        last_version + 1,
        correlation_id
    )
}
