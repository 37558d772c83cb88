//! Outbox events emitted by this writer.

use event_schema::DomainEvent;
use sqlx::{Postgres, Transaction};
use transactional_outbox::{outbox_event, OutboxResult, SqlxOutboxRepository};

use crate::domain::Offering;

pub async fn offering_created(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    offering: &Offering,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::OfferingCreated(offering.to_payload()),
        offering.version,
        correlation_id
    )
}

pub async fn offering_updated(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    offering: &Offering,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::OfferingUpdated(offering.to_payload()),
        offering.version,
        correlation_id
    )
}

pub async fn publication_initiated(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    offering: &Offering,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::OfferingPublicationInitiated(offering.to_payload()),
        offering.version,
        correlation_id
    )
}

pub async fn offering_published(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    offering: &Offering,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::OfferingPublished(offering.to_payload()),
        offering.version,
        correlation_id
    )
}

pub async fn publication_failed(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    offering: &Offering,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::OfferingPublicationFailed(offering.to_payload()),
        offering.version,
        correlation_id
    )
}

pub async fn offering_retired(
    tx: &mut Transaction<'_, Postgres>,
    outbox: &SqlxOutboxRepository,
    offering: &Offering,
    correlation_id: Option<String>,
) -> OutboxResult<()> {
    outbox_event!(
        tx,
        outbox,
        DomainEvent::OfferingRetired(offering.to_payload()),
        offering.version,
        correlation_id
    )
}
