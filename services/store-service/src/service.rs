//! Projection operations over the document store and the search index.

use error_types::{AppError, AppResult};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::composer::{ComposeError, Composer, Composition};
use crate::db::{self, RefEntity};
use crate::es::EsClient;

/// Outcome of a sync pass for one offering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Document composed, stored and indexed
    Synced,
    /// Authoritative offering was retired; any stored document removed
    Removed,
}

pub struct ProjectionService {
    pool: PgPool,
    composer: Composer,
    es: EsClient,
}

impl ProjectionService {
    pub fn new(pool: PgPool, composer: Composer, es: EsClient) -> Self {
        Self { pool, composer, es }
    }

    /// Compose and store the document for one offering, replacing whatever
    /// was there. Running this twice against unchanged writers produces an
    /// identical document.
    pub async fn sync_offering(&self, offering_id: Uuid) -> Result<SyncOutcome, ComposeError> {
        match self.composer.compose(offering_id).await? {
            Composition::Document(document) => {
                let value = serde_json::to_value(&*document)
                    .map_err(|e| ComposeError::Upstream(format!("document encoding: {e}")))?;

                db::upsert_document(&self.pool, offering_id, &value)
                    .await
                    .map_err(|e| ComposeError::Upstream(format!("document store: {e}")))?;

                self.es
                    .index_offering(offering_id, &value)
                    .await
                    .map_err(|e| ComposeError::Upstream(format!("search index: {e}")))?;

                info!(offering_id = %offering_id, "offering synced to store");
                Ok(SyncOutcome::Synced)
            }
            Composition::Retired => {
                self.remove_offering(offering_id)
                    .await
                    .map_err(|e| ComposeError::Upstream(e.to_string()))?;
                Ok(SyncOutcome::Removed)
            }
        }
    }

    /// Remove an offering from the document store and the index.
    pub async fn remove_offering(&self, offering_id: Uuid) -> AppResult<()> {
        let existed = db::delete_document(&self.pool, offering_id).await?;
        self.es
            .delete_offering(offering_id)
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("search index: {e}")))?;

        if existed {
            info!(offering_id = %offering_id, "offering removed from store");
        }
        Ok(())
    }

    /// Offerings whose documents reference a changed entity.
    pub async fn affected_offerings(
        &self,
        entity: RefEntity,
        entity_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        db::find_referencing_offerings(&self.pool, entity, entity_id).await
    }

    pub async fn get_offering(&self, id: Uuid) -> AppResult<serde_json::Value> {
        db::get_document(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("offering {id} not in store")))
    }

    pub async fn list_offerings(
        &self,
        limit: i64,
        offset: i64,
    ) -> AppResult<Vec<serde_json::Value>> {
        db::list_documents(&self.pool, limit, offset).await
    }

    pub async fn search(&self, query: &str, limit: i64) -> AppResult<Vec<serde_json::Value>> {
        self.es
            .search(query, limit)
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("search index: {e}")))
    }
}
