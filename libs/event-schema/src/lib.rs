use chrono::{DateTime, Utc};
/// Event schema registry for all broker topics across the catalog services
///
/// This library defines the versioned event envelope and the typed domain
/// events every producer and consumer agrees on. Each event carries a
/// `schema_version` field so payload changes stay detectable as services
/// evolve.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Domain events enumeration
pub mod events;
// Routing keys per event family
pub mod routing_keys;

pub use events::DomainEvent;

/// Current schema version for all events
pub const SCHEMA_VERSION: &str = "1.0";

/// Base event envelope for all broker messages.
///
/// `event_id` is the idempotency key at consumers. `entity_version` is
/// monotonic per entity and lets read models discard stale updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID for idempotency and tracing
    pub event_id: Uuid,
    /// Schema version for compatibility checking
    pub schema_version: String,
    /// Version of the entity at the time the event was emitted
    pub entity_version: i64,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
    /// Correlation ID for distributed tracing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// The typed event; serialized as `event_type` + `payload`
    #[serde(flatten)]
    pub event: DomainEvent,
}

impl EventEnvelope {
    pub fn new(event: DomainEvent, entity_version: i64) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            schema_version: SCHEMA_VERSION.to_string(),
            entity_version,
            timestamp: Utc::now(),
            correlation_id: None,
            event,
        }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }

    /// Routing key of the event family this envelope belongs to.
    pub fn routing_key(&self) -> &'static str {
        self.event.routing_key()
    }
}

/// Optimistic-concurrency check used by read models.
///
/// Returns true when the incoming version is newer than the stored one and
/// should be applied.
pub fn check_version(incoming_version: i64, stored_version: i64) -> bool {
    incoming_version > stored_version
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EntityRef;

    #[test]
    fn envelope_wire_format_is_flat() {
        let envelope = EventEnvelope::new(
            DomainEvent::CharacteristicDeleted(EntityRef { id: Uuid::new_v4() }),
            3,
        )
        .with_correlation_id("corr-1");

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["event_type"], "CharacteristicDeleted");
        assert_eq!(value["schema_version"], "1.0");
        assert_eq!(value["entity_version"], 3);
        assert_eq!(value["correlation_id"], "corr-1");
        assert!(value["payload"]["id"].is_string());
        assert!(value.get("event").is_none());
    }

    #[test]
    fn envelope_round_trips() {
        let envelope = EventEnvelope::new(
            DomainEvent::CharacteristicDeleted(EntityRef { id: Uuid::new_v4() }),
            1,
        );
        let json = serde_json::to_string(&envelope).unwrap();
        let decoded: EventEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.event_id, envelope.event_id);
        assert_eq!(decoded.event, envelope.event);
    }

    #[test]
    fn version_check_rejects_stale() {
        assert!(check_version(2, 1));
        assert!(!check_version(1, 1));
        assert!(!check_version(1, 2));
    }
}
