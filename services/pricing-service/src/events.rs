//! Outbox events emitted by this writer.

use event_schema::events::{EntityRef, PriceLockPayload, PriceUnlockPayload};
use event_schema::DomainEvent;
use sqlx::{Postgres, Transaction};
use transactional_outbox::{outbox_event, OutboxResult, SqlxOutboxRepository};
use uuid::Uuid;

use crate::models::Price;

pub async fn price_created(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    price: &Price,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::PriceCreated(price.to_payload()),
        price.version,
        correlation_id
    )
}

pub async fn price_updated(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    price: &Price,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::PriceUpdated(price.to_payload()),
        price.version,
        correlation_id
    )
}

pub async fn price_deleted(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    price_id: Uuid,
    last_version: i64,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::PriceDeleted(EntityRef { id: price_id }),
        last_version + 1,
        correlation_id
    )
}

pub async fn price_locked(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    price_id: Uuid,
    saga_id: Uuid,
    version: i64,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::PriceLocked(PriceLockPayload {
            id: price_id,
            locked_by_saga_id: saga_id,
        }),
        version
    )
}

pub async fn price_unlocked(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    price_id: Uuid,
    previously_locked_by: Option<Uuid>,
    version: i64,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::PriceUnlocked(PriceUnlockPayload {
            id: price_id,
            previously_locked_by,
        }),
        version
    )
}
