//! Read-through composition of the denormalized offering document.
//!
//! Composition always reads the current authoritative state from the writer
//! services, so out-of-order events about the same entity converge on the
//! latest truth. Calls are bounded by the configured timeout; any timeout or
//! non-2xx surfaces as a transient error so the triggering message is
//! redelivered instead of ledgered.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{IdentityConfig, UpstreamConfig};
use crate::models::{
    ComposedCharacteristic, ComposedPrice, ComposedSpecification, DenormalizedOffering,
};

#[derive(Debug, thiserror::Error)]
pub enum ComposeError {
    /// Upstream unreachable, slow, or answering outside 2xx. Redeliverable.
    #[error("upstream failure during composition: {0}")]
    Upstream(String),
}

/// What composition found.
#[derive(Debug)]
pub enum Composition {
    Document(Box<DenormalizedOffering>),
    /// The authoritative offering is already retired; any stored document
    /// must be removed instead.
    Retired,
}

#[derive(Debug, Deserialize)]
struct OfferingDto {
    id: Uuid,
    name: String,
    description: Option<String>,
    specification_ids: Vec<Uuid>,
    pricing_ids: Vec<Uuid>,
    sales_channels: Vec<String>,
    lifecycle_status: String,
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct SpecificationDto {
    id: Uuid,
    name: String,
    characteristic_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CharacteristicDto {
    id: Uuid,
    name: String,
    value: String,
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceDto {
    id: Uuid,
    name: String,
    value: Decimal,
    unit: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct TokenDto {
    access_token: String,
}

pub struct Composer {
    http: reqwest::Client,
    upstreams: UpstreamConfig,
    identity: IdentityConfig,
    /// Cached service-account token; refreshed on 401.
    token: RwLock<Option<String>>,
}

impl Composer {
    pub fn new(upstreams: UpstreamConfig, identity: IdentityConfig) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(upstreams.timeout_ms))
            .timeout(Duration::from_millis(upstreams.timeout_ms))
            .build()
            .unwrap_or_default();

        Self {
            http,
            upstreams,
            identity,
            token: RwLock::new(None),
        }
    }

    /// Compose the full document for an offering by fetching the
    /// authoritative entities.
    pub async fn compose(&self, offering_id: Uuid) -> Result<Composition, ComposeError> {
        let offering: OfferingDto = self
            .fetch(&format!(
                "{}/api/v1/offerings/{offering_id}",
                self.upstreams.offering_url
            ))
            .await?;

        if offering.lifecycle_status == "RETIRED" {
            debug!(offering_id = %offering_id, "offering already retired, no document");
            return Ok(Composition::Retired);
        }

        let mut specifications = Vec::with_capacity(offering.specification_ids.len());
        for spec_id in &offering.specification_ids {
            let spec: SpecificationDto = self
                .fetch(&format!(
                    "{}/api/v1/specifications/{spec_id}",
                    self.upstreams.specification_url
                ))
                .await?;

            let mut characteristics = Vec::with_capacity(spec.characteristic_ids.len());
            for char_id in &spec.characteristic_ids {
                let characteristic: CharacteristicDto = self
                    .fetch(&format!(
                        "{}/api/v1/characteristics/{char_id}",
                        self.upstreams.characteristic_url
                    ))
                    .await?;
                characteristics.push(ComposedCharacteristic {
                    id: characteristic.id,
                    name: characteristic.name,
                    value: characteristic.value,
                    unit: characteristic.unit,
                });
            }

            specifications.push(ComposedSpecification {
                id: spec.id,
                name: spec.name,
                characteristics,
            });
        }

        let mut pricing = Vec::with_capacity(offering.pricing_ids.len());
        for price_id in &offering.pricing_ids {
            let price: PriceDto = self
                .fetch(&format!(
                    "{}/api/v1/prices/{price_id}",
                    self.upstreams.pricing_url
                ))
                .await?;
            pricing.push(ComposedPrice {
                id: price.id,
                name: price.name,
                value: price.value,
                currency: price.currency,
                unit: price.unit,
            });
        }

        Ok(Composition::Document(Box::new(DenormalizedOffering {
            id: offering.id,
            name: offering.name,
            description: offering.description,
            lifecycle_status: offering.lifecycle_status,
            sales_channels: offering.sales_channels,
            published_at: offering.published_at,
            specifications,
            pricing,
        })))
    }

    async fn fetch<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ComposeError> {
        let token = self.service_token().await?;

        let response = self
            .http
            .get(url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ComposeError::Upstream(format!("GET {url}: {e}")))?;

        // A stale service token is refreshed once and the call retried.
        let response = if response.status().as_u16() == 401 {
            warn!(url, "service token rejected, refreshing");
            *self.token.write().await = None;
            let token = self.service_token().await?;
            self.http
                .get(url)
                .bearer_auth(&token)
                .send()
                .await
                .map_err(|e| ComposeError::Upstream(format!("GET {url}: {e}")))?
        } else {
            response
        };

        if !response.status().is_success() {
            return Err(ComposeError::Upstream(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ComposeError::Upstream(format!("GET {url}: invalid body: {e}")))
    }

    async fn service_token(&self) -> Result<String, ComposeError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }

        let response = self
            .http
            .post(format!("{}/api/v1/auth/login", self.identity.url))
            .json(&serde_json::json!({
                "username": self.identity.username,
                "password": self.identity.password,
            }))
            .send()
            .await
            .map_err(|e| ComposeError::Upstream(format!("identity login: {e}")))?;

        if !response.status().is_success() {
            return Err(ComposeError::Upstream(format!(
                "identity login returned {}",
                response.status()
            )));
        }

        let token: TokenDto = response
            .json()
            .await
            .map_err(|e| ComposeError::Upstream(format!("identity login: invalid body: {e}")))?;

        *self.token.write().await = Some(token.access_token.clone());
        Ok(token.access_token)
    }
}
