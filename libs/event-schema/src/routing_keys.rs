//! Routing keys per event family on the topic exchange.

pub const CHARACTERISTICS: &str = "resource.characteristics.events";
pub const SPECIFICATIONS: &str = "resource.specifications.events";
pub const PRICING: &str = "commercial.pricing.events";
pub const OFFERINGS: &str = "product.offering.events";

/// All routing keys, in the order consumers typically bind them.
pub const ALL: [&str; 4] = [CHARACTERISTICS, SPECIFICATIONS, PRICING, OFFERINGS];
