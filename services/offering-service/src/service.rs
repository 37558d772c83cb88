//! Offering write operations and the publication entry point.
//!
//! `publish` performs the DRAFT→PUBLISHING transition and writes the
//! `OfferingPublicationInitiated` outbox row in one transaction, then starts
//! the saga on the workflow engine. The offering stays PUBLISHING until the
//! saga's confirm task (success) or revert task (compensation) moves it on;
//! nothing here short-circuits to PUBLISHED.

use error_types::{AppError, AppResult};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, info};
use transactional_outbox::SqlxOutboxRepository;
use uuid::Uuid;

use crate::db;
use crate::domain::Offering;
use crate::events;
use crate::models::{CreateOffering, UpdateOffering};
use crate::saga::SagaLauncher;

pub struct OfferingService {
    pool: PgPool,
    outbox: Arc<SqlxOutboxRepository>,
    launcher: SagaLauncher,
}

impl OfferingService {
    pub fn new(pool: PgPool, outbox: Arc<SqlxOutboxRepository>, launcher: SagaLauncher) -> Self {
        Self {
            pool,
            outbox,
            launcher,
        }
    }

    pub async fn create(
        &self,
        input: CreateOffering,
        correlation_id: Option<String>,
    ) -> AppResult<Offering> {
        let offering = Offering::new(
            input.name,
            input.description,
            input.specification_ids,
            input.pricing_ids,
            input.sales_channels,
        );

        let mut tx = self.pool.begin().await?;
        db::insert(&mut tx, &offering).await?;
        events::offering_created(&mut tx, &self.outbox, &offering, correlation_id).await?;
        tx.commit().await?;

        info!(offering_id = %offering.id, "offering created");
        Ok(offering)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Offering> {
        db::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("offering {id} not found")))
    }

    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Offering>> {
        db::list(&self.pool, limit, offset).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateOffering,
        correlation_id: Option<String>,
    ) -> AppResult<Offering> {
        let mut offering = self.get(id).await?;
        offering.ensure_draft("update")?;

        offering.name = input.name;
        offering.description = input.description;
        offering.specification_ids = input.specification_ids;
        offering.pricing_ids = input.pricing_ids;
        offering.sales_channels = input.sales_channels;
        offering.version += 1;
        offering.updated_at = chrono::Utc::now();

        let mut tx = self.pool.begin().await?;
        db::update(&mut tx, &offering).await?;
        events::offering_updated(&mut tx, &self.outbox, &offering, correlation_id).await?;
        tx.commit().await?;

        info!(offering_id = %offering.id, version = offering.version, "offering updated");
        Ok(offering)
    }

    pub async fn delete(&self, id: Uuid) -> AppResult<()> {
        let offering = self.get(id).await?;
        offering.ensure_draft("delete")?;

        let mut tx = self.pool.begin().await?;
        db::delete(&mut tx, id).await?;
        tx.commit().await?;

        info!(offering_id = %id, "offering deleted");
        Ok(())
    }

    /// Initiate publication: transition to PUBLISHING, emit the initiation
    /// event, then start the saga.
    pub async fn publish(&self, id: Uuid, correlation_id: Option<String>) -> AppResult<Offering> {
        let mut offering = self.get(id).await?;
        offering.publish()?;

        let mut tx = self.pool.begin().await?;
        db::update(&mut tx, &offering).await?;
        events::publication_initiated(&mut tx, &self.outbox, &offering, correlation_id.clone())
            .await?;
        tx.commit().await?;

        // The transition is durable; now hand the business transaction to
        // the orchestrator. If the engine cannot accept it, compensate
        // locally so the offering does not stay stuck in PUBLISHING.
        if let Err(e) = self.launcher.start_publication(&offering).await {
            error!(offering_id = %id, error = %e, "saga start failed, reverting to draft");
            self.fail(id, correlation_id).await?;
            return Err(AppError::ServiceUnavailable(
                "publication workflow could not be started".to_string(),
            ));
        }

        info!(offering_id = %id, "publication initiated");
        self.get(id).await
    }

    /// PUBLISHING → PUBLISHED; driven by the saga's confirm task.
    pub async fn confirm(&self, id: Uuid, correlation_id: Option<String>) -> AppResult<Offering> {
        let mut offering = self.get(id).await?;
        offering.confirm_publication()?;

        let mut tx = self.pool.begin().await?;
        db::update(&mut tx, &offering).await?;
        events::offering_published(&mut tx, &self.outbox, &offering, correlation_id).await?;
        tx.commit().await?;

        info!(offering_id = %id, "publication confirmed");
        Ok(offering)
    }

    /// PUBLISHING → DRAFT; driven by the saga's compensation.
    pub async fn fail(&self, id: Uuid, correlation_id: Option<String>) -> AppResult<Offering> {
        let mut offering = self.get(id).await?;
        offering.fail_publication()?;

        let mut tx = self.pool.begin().await?;
        db::update(&mut tx, &offering).await?;
        events::publication_failed(&mut tx, &self.outbox, &offering, correlation_id).await?;
        tx.commit().await?;

        info!(offering_id = %id, "publication failed, offering back in draft");
        Ok(offering)
    }

    /// PUBLISHED → RETIRED.
    pub async fn retire(&self, id: Uuid, correlation_id: Option<String>) -> AppResult<Offering> {
        let mut offering = self.get(id).await?;
        offering.retire()?;

        let mut tx = self.pool.begin().await?;
        db::update(&mut tx, &offering).await?;
        events::offering_retired(&mut tx, &self.outbox, &offering, correlation_id).await?;
        tx.commit().await?;

        info!(offering_id = %id, "offering retired");
        Ok(offering)
    }
}
