//! Search-index client for composed offerings.

use elasticsearch::{
    http::transport::{BuildError, SingleNodeConnectionPool, TransportBuilder},
    indices::{IndicesCreateParts, IndicesExistsParts},
    DeleteParts, Elasticsearch, IndexParts, SearchParts,
};
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum EsError {
    #[error("invalid Elasticsearch URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to build transport: {0}")]
    TransportBuild(#[from] BuildError),
    #[error("transport error: {0}")]
    Transport(#[from] elasticsearch::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("search failed with status {0}")]
    SearchFailed(u16),
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: Option<Value>,
}

#[derive(Clone)]
pub struct EsClient {
    client: Elasticsearch,
    index: String,
}

impl EsClient {
    pub async fn new(url: &str, index: &str) -> Result<Self, EsError> {
        let parsed = Url::parse(url)?;
        let pool = SingleNodeConnectionPool::new(parsed);
        let transport = TransportBuilder::new(pool).build()?;
        let client = Elasticsearch::new(transport);

        let instance = Self {
            client,
            index: index.to_string(),
        };
        instance.ensure_index().await?;

        Ok(instance)
    }

    async fn ensure_index(&self) -> Result<(), EsError> {
        let exists = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[self.index.as_str()]))
            .send()
            .await?;

        if exists.status_code().is_success() {
            return Ok(());
        }

        let body = json!({
            "mappings": {
                "properties": {
                    "id": { "type": "keyword" },
                    "name": {
                        "type": "text",
                        "fields": { "keyword": { "type": "keyword" } },
                        "boost": 2.0
                    },
                    "description": { "type": "text" },
                    "lifecycle_status": { "type": "keyword" },
                    "sales_channels": { "type": "keyword" },
                    "published_at": { "type": "date" },
                    "specifications": {
                        "type": "nested",
                        "properties": {
                            "id": { "type": "keyword" },
                            "name": { "type": "text" },
                            "characteristics": {
                                "type": "nested",
                                "properties": {
                                    "id": { "type": "keyword" },
                                    "name": { "type": "text" },
                                    "value": { "type": "keyword" },
                                    "unit": { "type": "keyword" }
                                }
                            }
                        }
                    },
                    "pricing": {
                        "type": "nested",
                        "properties": {
                            "id": { "type": "keyword" },
                            "name": { "type": "text" },
                            "value": { "type": "double" },
                            "currency": { "type": "keyword" },
                            "unit": { "type": "keyword" }
                        }
                    }
                }
            }
        });

        self.client
            .indices()
            .create(IndicesCreateParts::Index(&self.index))
            .body(body)
            .send()
            .await?;

        Ok(())
    }

    /// Index a composed document. Decimal price values are converted to
    /// native doubles here and only here; the authoritative document keeps
    /// the original scale.
    pub async fn index_offering(&self, id: Uuid, document: &Value) -> Result<(), EsError> {
        let body = index_representation(document);

        self.client
            .index(IndexParts::IndexId(&self.index, id.to_string().as_str()))
            .body(body)
            .send()
            .await?;

        Ok(())
    }

    pub async fn delete_offering(&self, id: Uuid) -> Result<(), EsError> {
        self.client
            .delete(DeleteParts::IndexId(&self.index, id.to_string().as_str()))
            .send()
            .await?;

        Ok(())
    }

    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<Value>, EsError> {
        let size = limit.clamp(1, 100);

        let body = json!({
            "size": size,
            "query": {
                "multi_match": {
                    "query": query,
                    "fields": ["name^2", "description", "sales_channels"],
                    "type": "best_fields"
                }
            },
            "sort": [{ "_score": { "order": "desc" } }]
        });

        let response = self
            .client
            .search(SearchParts::Index(&[self.index.as_str()]))
            .body(body)
            .send()
            .await?;

        let status = response.status_code();
        if !status.is_success() {
            return Err(EsError::SearchFailed(status.as_u16()));
        }

        let search_response: SearchResponse = response.json().await?;
        Ok(search_response
            .hits
            .hits
            .into_iter()
            .filter_map(|hit| hit.source)
            .collect())
    }
}

/// Document copy with `pricing[].value` widened from decimal string to f64.
fn index_representation(document: &Value) -> Value {
    let mut body = document.clone();
    if let Some(prices) = body.get_mut("pricing").and_then(Value::as_array_mut) {
        for price in prices {
            let widened = price
                .get("value")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<rust_decimal::Decimal>().ok())
                .and_then(|d| d.to_f64());
            if let (Some(value), Some(slot)) = (widened, price.get_mut("value")) {
                *slot = json!(value);
            }
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_representation_widens_price_values() {
        let document = json!({
            "id": "x",
            "pricing": [
                { "id": "p1", "value": "49.99", "currency": "USD" },
                { "id": "p2", "value": "10.00", "currency": "USD" }
            ]
        });

        let body = index_representation(&document);
        assert_eq!(body["pricing"][0]["value"], json!(49.99));
        assert_eq!(body["pricing"][1]["value"], json!(10.0));
        // The source document is untouched.
        assert_eq!(document["pricing"][0]["value"], "49.99");
    }

    #[test]
    fn index_representation_tolerates_missing_pricing() {
        let document = json!({ "id": "x", "name": "bare" });
        let body = index_representation(&document);
        assert_eq!(body, document);
    }
}
