use chrono::{DateTime, Utc};
use event_schema::events::CharacteristicPayload;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A resource characteristic, e.g. `{name: "Speed", value: "100", unit: "Mbps"}`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Characteristic {
    pub id: Uuid,
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Characteristic {
    pub fn new(name: String, value: String, unit: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            value,
            unit,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdateCharacteristic) {
        self.name = update.name;
        self.value = update.value;
        self.unit = update.unit;
        self.version += 1;
        self.updated_at = Utc::now();
    }

    pub fn to_payload(&self) -> CharacteristicPayload {
        CharacteristicPayload {
            id: self.id,
            name: self.name.clone(),
            value: self.value.clone(),
            unit: self.unit.clone(),
            version: self.version,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCharacteristic {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub value: String,
    #[validate(length(max = 100))]
    pub unit: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCharacteristic {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 255))]
    pub value: String,
    #[validate(length(max = 100))]
    pub unit: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_bumps_version_and_timestamp() {
        let mut characteristic =
            Characteristic::new("Speed".into(), "100".into(), Some("Mbps".into()));
        let created_at = characteristic.created_at;

        characteristic.apply_update(UpdateCharacteristic {
            name: "Speed".into(),
            value: "200".into(),
            unit: Some("Mbps".into()),
        });

        assert_eq!(characteristic.version, 2);
        assert_eq!(characteristic.value, "200");
        assert_eq!(characteristic.created_at, created_at);
        assert!(characteristic.updated_at >= created_at);
    }
}
