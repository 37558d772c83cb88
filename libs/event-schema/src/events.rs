//! Typed domain events for every event family.
//!
//! The wire contract is the JSON envelope; `event_type` is the serde tag and
//! `payload` the content, so producers and consumers share one enum instead
//! of loosely shaped maps.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::routing_keys;

/// Minimal payload for deletion events: just the entity id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacteristicPayload {
    pub id: Uuid,
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecificationPayload {
    pub id: Uuid,
    pub name: String,
    pub characteristic_ids: Vec<Uuid>,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricePayload {
    pub id: Uuid,
    pub name: String,
    pub value: Decimal,
    pub unit: String,
    pub currency: String,
    pub locked: bool,
    pub version: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLockPayload {
    pub id: Uuid,
    pub locked_by_saga_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceUnlockPayload {
    pub id: Uuid,
    pub previously_locked_by: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferingPayload {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub specification_ids: Vec<Uuid>,
    pub pricing_ids: Vec<Uuid>,
    pub sales_channels: Vec<String>,
    pub lifecycle_status: String,
    pub version: i64,
    pub published_at: Option<DateTime<Utc>>,
    pub retired_at: Option<DateTime<Utc>>,
}

/// All domain events carried on the `catalog.events` exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", content = "payload")]
pub enum DomainEvent {
    CharacteristicCreated(CharacteristicPayload),
    CharacteristicUpdated(CharacteristicPayload),
    CharacteristicDeleted(EntityRef),
    SpecificationCreated(SpecificationPayload),
    SpecificationUpdated(SpecificationPayload),
    SpecificationDeleted(EntityRef),
    PriceCreated(PricePayload),
    PriceUpdated(PricePayload),
    PriceDeleted(EntityRef),
    PriceLocked(PriceLockPayload),
    PriceUnlocked(PriceUnlockPayload),
    OfferingCreated(OfferingPayload),
    OfferingUpdated(OfferingPayload),
    OfferingPublicationInitiated(OfferingPayload),
    OfferingPublished(OfferingPayload),
    OfferingPublicationFailed(OfferingPayload),
    OfferingRetired(OfferingPayload),
}

impl DomainEvent {
    /// Routing key of the family this event belongs to.
    pub fn routing_key(&self) -> &'static str {
        match self {
            DomainEvent::CharacteristicCreated(_)
            | DomainEvent::CharacteristicUpdated(_)
            | DomainEvent::CharacteristicDeleted(_) => routing_keys::CHARACTERISTICS,
            DomainEvent::SpecificationCreated(_)
            | DomainEvent::SpecificationUpdated(_)
            | DomainEvent::SpecificationDeleted(_) => routing_keys::SPECIFICATIONS,
            DomainEvent::PriceCreated(_)
            | DomainEvent::PriceUpdated(_)
            | DomainEvent::PriceDeleted(_)
            | DomainEvent::PriceLocked(_)
            | DomainEvent::PriceUnlocked(_) => routing_keys::PRICING,
            DomainEvent::OfferingCreated(_)
            | DomainEvent::OfferingUpdated(_)
            | DomainEvent::OfferingPublicationInitiated(_)
            | DomainEvent::OfferingPublished(_)
            | DomainEvent::OfferingPublicationFailed(_)
            | DomainEvent::OfferingRetired(_) => routing_keys::OFFERINGS,
        }
    }

    /// Id of the entity the event is about.
    pub fn entity_id(&self) -> Uuid {
        match self {
            DomainEvent::CharacteristicCreated(p) | DomainEvent::CharacteristicUpdated(p) => p.id,
            DomainEvent::CharacteristicDeleted(r)
            | DomainEvent::SpecificationDeleted(r)
            | DomainEvent::PriceDeleted(r) => r.id,
            DomainEvent::SpecificationCreated(p) | DomainEvent::SpecificationUpdated(p) => p.id,
            DomainEvent::PriceCreated(p) | DomainEvent::PriceUpdated(p) => p.id,
            DomainEvent::PriceLocked(p) => p.id,
            DomainEvent::PriceUnlocked(p) => p.id,
            DomainEvent::OfferingCreated(p)
            | DomainEvent::OfferingUpdated(p)
            | DomainEvent::OfferingPublicationInitiated(p)
            | DomainEvent::OfferingPublished(p)
            | DomainEvent::OfferingPublicationFailed(p)
            | DomainEvent::OfferingRetired(p) => p.id,
        }
    }

    /// Stable name of the event type as it appears on the wire.
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::CharacteristicCreated(_) => "CharacteristicCreated",
            DomainEvent::CharacteristicUpdated(_) => "CharacteristicUpdated",
            DomainEvent::CharacteristicDeleted(_) => "CharacteristicDeleted",
            DomainEvent::SpecificationCreated(_) => "SpecificationCreated",
            DomainEvent::SpecificationUpdated(_) => "SpecificationUpdated",
            DomainEvent::SpecificationDeleted(_) => "SpecificationDeleted",
            DomainEvent::PriceCreated(_) => "PriceCreated",
            DomainEvent::PriceUpdated(_) => "PriceUpdated",
            DomainEvent::PriceDeleted(_) => "PriceDeleted",
            DomainEvent::PriceLocked(_) => "PriceLocked",
            DomainEvent::PriceUnlocked(_) => "PriceUnlocked",
            DomainEvent::OfferingCreated(_) => "OfferingCreated",
            DomainEvent::OfferingUpdated(_) => "OfferingUpdated",
            DomainEvent::OfferingPublicationInitiated(_) => "OfferingPublicationInitiated",
            DomainEvent::OfferingPublished(_) => "OfferingPublished",
            DomainEvent::OfferingPublicationFailed(_) => "OfferingPublicationFailed",
            DomainEvent::OfferingRetired(_) => "OfferingRetired",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn price_event_serializes_value_as_string() {
        let event = DomainEvent::PriceCreated(PricePayload {
            id: Uuid::new_v4(),
            name: "basic".to_string(),
            value: Decimal::from_str("49.99").unwrap(),
            unit: "month".to_string(),
            currency: "USD".to_string(),
            locked: false,
            version: 1,
        });

        let value = serde_json::to_value(&event).unwrap();
        // Decimal scale survives the document representation verbatim.
        assert_eq!(value["payload"]["value"], "49.99");
    }

    #[test]
    fn routing_keys_by_family() {
        let char_event = DomainEvent::CharacteristicDeleted(EntityRef { id: Uuid::new_v4() });
        assert_eq!(char_event.routing_key(), "resource.characteristics.events");

        let lock = DomainEvent::PriceLocked(PriceLockPayload {
            id: Uuid::new_v4(),
            locked_by_saga_id: Uuid::new_v4(),
        });
        assert_eq!(lock.routing_key(), "commercial.pricing.events");
    }

    #[test]
    fn event_type_matches_serde_tag() {
        let event = DomainEvent::SpecificationDeleted(EntityRef { id: Uuid::new_v4() });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event_type"], event.event_type());
    }
}
