//! Specification write operations.
//!
//! Reference validation goes against the locally cached characteristic ids,
//! never against the characteristic service directly; staleness can only
//! reject a valid reference, never accept an invalid one.

use error_types::{AppError, AppResult};
use sqlx::PgPool;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use transactional_outbox::SqlxOutboxRepository;
use uuid::Uuid;

use crate::db;
use crate::events;
use crate::models::{CreateSpecification, Specification, UpdateSpecification};

pub struct SpecificationService {
    pool: PgPool,
    outbox: Arc<SqlxOutboxRepository>,
}

impl SpecificationService {
    pub fn new(pool: PgPool, outbox: Arc<SqlxOutboxRepository>) -> Self {
        Self { pool, outbox }
    }

    async fn validate_characteristics(&self, characteristic_ids: &[Uuid]) -> AppResult<()> {
        if characteristic_ids.is_empty() {
            return Err(AppError::Validation(
                "a specification must have at least one characteristic".to_string(),
            ));
        }

        let existing: HashSet<Uuid> = db::cache::existing_ids(&self.pool, characteristic_ids)
            .await?
            .into_iter()
            .collect();

        let missing: Vec<String> = characteristic_ids
            .iter()
            .filter(|id| !existing.contains(id))
            .map(|id| id.to_string())
            .collect();

        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "unknown characteristic ids: {}",
                missing.join(", ")
            )));
        }

        Ok(())
    }

    pub async fn create(
        &self,
        input: CreateSpecification,
        correlation_id: Option<String>,
    ) -> AppResult<Specification> {
        if db::find_by_name(&self.pool, &input.name).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "specification with name '{}' already exists",
                input.name
            )));
        }

        self.validate_characteristics(&input.characteristic_ids)
            .await?;

        let spec = Specification::new(input.name, input.characteristic_ids);

        let mut tx = self.pool.begin().await?;
        db::insert(&mut tx, &spec).await?;
        events::specification_created(&mut tx, &self.outbox, &spec, correlation_id).await?;
        tx.commit().await?;

        info!(specification_id = %spec.id, "specification created");
        Ok(spec)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Specification> {
        db::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("specification {id} not found")))
    }

    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Specification>> {
        db::list(&self.pool, limit, offset).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateSpecification,
        correlation_id: Option<String>,
    ) -> AppResult<Specification> {
        let mut spec = self.get(id).await?;

        if input.name != spec.name {
            if db::find_by_name(&self.pool, &input.name).await?.is_some() {
                return Err(AppError::Conflict(format!(
                    "specification with name '{}' already exists",
                    input.name
                )));
            }
        }

        self.validate_characteristics(&input.characteristic_ids)
            .await?;

        spec.apply_update(input);

        let mut tx = self.pool.begin().await?;
        db::update(&mut tx, &spec).await?;
        events::specification_updated(&mut tx, &self.outbox, &spec, correlation_id).await?;
        tx.commit().await?;

        info!(specification_id = %spec.id, version = spec.version, "specification updated");
        Ok(spec)
    }

    pub async fn delete(&self, id: Uuid, correlation_id: Option<String>) -> AppResult<()> {
        let spec = self.get(id).await?;

        let mut tx = self.pool.begin().await?;
        db::delete(&mut tx, id).await?;
        events::specification_deleted(&mut tx, &self.outbox, id, spec.version, correlation_id)
            .await?;
        tx.commit().await?;

        info!(specification_id = %id, "specification deleted");
        Ok(())
    }

    /// Existence check over a list of ids; used by the saga's validation
    /// step. Fails on the first missing id.
    pub async fn validate_all(&self, spec_ids: &[Uuid]) -> AppResult<()> {
        for id in spec_ids {
            self.get(*id).await?;
        }
        Ok(())
    }
}
