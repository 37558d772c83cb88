//! Composed read-model document shapes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The denormalized offering document stored in `published_offerings`.
///
/// Price values stay decimals here; they are widened to doubles only at the
/// search-index boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenormalizedOffering {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub lifecycle_status: String,
    pub sales_channels: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub specifications: Vec<ComposedSpecification>,
    pub pricing: Vec<ComposedPrice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedSpecification {
    pub id: Uuid,
    pub name: String,
    pub characteristics: Vec<ComposedCharacteristic>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedCharacteristic {
    pub id: Uuid,
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComposedPrice {
    pub id: Uuid,
    pub name: String,
    pub value: Decimal,
    pub currency: String,
    pub unit: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn document_keeps_price_scale_as_string() {
        let document = DenormalizedOffering {
            id: Uuid::new_v4(),
            name: "Fiber".into(),
            description: None,
            lifecycle_status: "PUBLISHED".into(),
            sales_channels: vec!["WEB".into()],
            published_at: None,
            specifications: vec![],
            pricing: vec![ComposedPrice {
                id: Uuid::new_v4(),
                name: "monthly".into(),
                value: Decimal::from_str("49.90").unwrap(),
                currency: "USD".into(),
                unit: "month".into(),
            }],
        };

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["pricing"][0]["value"], "49.90");
    }
}
