use chrono::{DateTime, Utc};
use event_schema::events::PricePayload;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A commercial price. While `locked` is set the row belongs to a running
/// publication saga and refuses updates and deletion.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Price {
    pub id: Uuid,
    pub name: String,
    pub value: Decimal,
    pub unit: String,
    pub currency: String,
    pub locked: bool,
    pub locked_by_saga_id: Option<Uuid>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Price {
    pub fn new(name: String, value: Decimal, unit: String, currency: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            value,
            unit,
            currency,
            locked: false,
            locked_by_saga_id: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, update: UpdatePrice) {
        self.name = update.name;
        self.value = update.value;
        self.unit = update.unit;
        self.currency = update.currency;
        self.version += 1;
        self.updated_at = Utc::now();
    }

    pub fn to_payload(&self) -> PricePayload {
        PricePayload {
            id: self.id,
            name: self.name.clone(),
            value: self.value,
            unit: self.unit.clone(),
            currency: self.currency.clone(),
            locked: self.locked,
            version: self.version,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePrice {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub value: Decimal,
    #[validate(length(min = 1, max = 100))]
    pub unit: String,
    #[validate(length(equal = 3))]
    pub currency: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePrice {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub value: Decimal,
    #[validate(length(min = 1, max = 100))]
    pub unit: String,
    #[validate(length(equal = 3))]
    pub currency: String,
}

#[derive(Debug, Deserialize)]
pub struct LockRequest {
    pub saga_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn new_price_is_unlocked() {
        let price = Price::new(
            "basic".into(),
            Decimal::from_str("49.99").unwrap(),
            "month".into(),
            "USD".into(),
        );
        assert!(!price.locked);
        assert!(price.locked_by_saga_id.is_none());
        assert_eq!(price.version, 1);
    }
}
