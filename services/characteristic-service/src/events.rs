//! Outbox events emitted by this writer; all characteristic events are
//! defined in one place.

use event_schema::events::EntityRef;
use event_schema::DomainEvent;
use sqlx::{Postgres, Transaction};
use transactional_outbox::{outbox_event, OutboxResult, SqlxOutboxRepository};
use uuid::Uuid;

use crate::models::Characteristic;

pub async fn characteristic_created(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    characteristic: &Characteristic,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::CharacteristicCreated(characteristic.to_payload()),
        characteristic.version,
        correlation_id
    )
}

pub async fn characteristic_updated(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    characteristic: &Characteristic,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::CharacteristicUpdated(characteristic.to_payload()),
        characteristic.version,
        correlation_id
    )
}

pub async fn characteristic_deleted(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    characteristic_id: Uuid,
    last_version: i64,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::CharacteristicDeleted(EntityRef {
            id: characteristic_id
        }),
        last_version + 1,
        correlation_id
    )
}
