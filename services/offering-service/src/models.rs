use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOffering {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub specification_ids: Vec<Uuid>,
    #[serde(default)]
    pub pricing_ids: Vec<Uuid>,
    #[serde(default)]
    pub sales_channels: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOffering {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub specification_ids: Vec<Uuid>,
    #[serde(default)]
    pub pricing_ids: Vec<Uuid>,
    #[serde(default)]
    pub sales_channels: Vec<String>,
}
