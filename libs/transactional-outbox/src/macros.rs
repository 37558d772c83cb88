//! Convenience macro for writing events to the outbox.

/// Insert a domain event into the outbox within an open transaction.
///
/// Builds the event envelope, derives the routing key from the event family
/// and inserts the PENDING row through the given repository. Expands to an
/// expression of type `OutboxResult<()>`.
///
/// # Arguments
///
/// * `$tx` - mutable reference to the open database transaction
/// * `$repo` - reference to an `OutboxRepository` implementation
/// * `$event` - a `DomainEvent` value
/// * `$entity_version` - version of the entity after the mutation
#[macro_export]
macro_rules! outbox_event {
    ($tx:expr, $repo:expr, $event:expr, $entity_version:expr) => {{
        use $crate::OutboxRepository as _;

        match $crate::OutboxRecord::for_event(&event_schema::EventEnvelope::new(
            $event,
            $entity_version,
        )) {
            Ok(record) => $repo.insert($tx, &record).await,
            Err(e) => Err(e),
        }
    }};
    ($tx:expr, $repo:expr, $event:expr, $entity_version:expr, $correlation_id:expr) => {{
        use $crate::OutboxRepository as _;

        let mut envelope = event_schema::EventEnvelope::new($event, $entity_version);
        if let Some(correlation_id) = $correlation_id {
            envelope = envelope.with_correlation_id(correlation_id);
        }
        match $crate::OutboxRecord::for_event(&envelope) {
            Ok(record) => $repo.insert($tx, &record).await,
            Err(e) => Err(e),
        }
    }};
}
