use chrono::{DateTime, Utc};
use event_schema::events::SpecificationPayload;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A specification: an ordered set of characteristic references.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Specification {
    pub id: Uuid,
    pub name: String,
    pub characteristic_ids: Vec<Uuid>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Specification {
    pub fn new(name: String, characteristic_ids: Vec<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            characteristic_ids,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdateSpecification) {
        self.name = update.name;
        self.characteristic_ids = update.characteristic_ids;
        self.version += 1;
        self.updated_at = Utc::now();
    }

    pub fn to_payload(&self) -> SpecificationPayload {
        SpecificationPayload {
            id: self.id,
            name: self.name.clone(),
            characteristic_ids: self.characteristic_ids.clone(),
            version: self.version,
        }
    }
}

/// Cached characteristic row maintained from characteristic events.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CachedCharacteristic {
    pub id: Uuid,
    pub name: String,
    /// Entity version of the last applied event
    pub version: i64,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateSpecification {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, message = "a specification needs at least one characteristic"))]
    pub characteristic_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateSpecification {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, message = "a specification needs at least one characteristic"))]
    pub characteristic_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_replaces_refs_and_bumps_version() {
        let first_char = Uuid::new_v4();
        let mut spec = Specification::new("Broadband".into(), vec![first_char]);

        let replacement = Uuid::new_v4();
        spec.apply_update(UpdateSpecification {
            name: "Broadband v2".into(),
            characteristic_ids: vec![replacement],
        });

        assert_eq!(spec.version, 2);
        assert_eq!(spec.characteristic_ids, vec![replacement]);
    }
}
