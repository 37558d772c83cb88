//! Price write operations, including the saga lock protocol.
//!
//! Lock semantics: acquisition is idempotent for the same saga id and
//! exclusive across sagas, enforced by a conditional update on the row
//! itself. Unlock is deliberately forgiving so compensation paths always
//! terminate.

use error_types::{AppError, AppResult};
use rust_decimal::Decimal;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use transactional_outbox::SqlxOutboxRepository;
use uuid::Uuid;

use crate::db;
use crate::events;
use crate::models::{CreatePrice, Price, UpdatePrice};

pub struct PricingService {
    pool: PgPool,
    outbox: Arc<SqlxOutboxRepository>,
}

impl PricingService {
    pub fn new(pool: PgPool, outbox: Arc<SqlxOutboxRepository>) -> Self {
        Self { pool, outbox }
    }

    fn validate_value(value: Decimal) -> AppResult<()> {
        if value <= Decimal::ZERO {
            return Err(AppError::Validation(
                "price value must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn create(
        &self,
        input: CreatePrice,
        correlation_id: Option<String>,
    ) -> AppResult<Price> {
        Self::validate_value(input.value)?;

        if db::find_by_name(&self.pool, &input.name).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "price with name '{}' already exists",
                input.name
            )));
        }

        let price = Price::new(input.name, input.value, input.unit, input.currency);

        let mut tx = self.pool.begin().await?;
        db::insert(&mut tx, &price).await?;
        events::price_created(&mut tx, &self.outbox, &price, correlation_id).await?;
        tx.commit().await?;

        info!(price_id = %price.id, "price created");
        Ok(price)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Price> {
        db::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("price {id} not found")))
    }

    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Price>> {
        db::list(&self.pool, limit, offset).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        input: UpdatePrice,
        correlation_id: Option<String>,
    ) -> AppResult<Price> {
        Self::validate_value(input.value)?;

        let mut price = self.get(id).await?;

        if price.locked {
            return Err(AppError::Locked(format!(
                "price {id} is locked by saga {:?} and cannot be modified",
                price.locked_by_saga_id
            )));
        }

        if input.name != price.name {
            if db::find_by_name(&self.pool, &input.name).await?.is_some() {
                return Err(AppError::Conflict(format!(
                    "price with name '{}' already exists",
                    input.name
                )));
            }
        }

        price.apply_update(input);

        let mut tx = self.pool.begin().await?;
        db::update(&mut tx, &price).await?;
        events::price_updated(&mut tx, &self.outbox, &price, correlation_id).await?;
        tx.commit().await?;

        info!(price_id = %price.id, version = price.version, "price updated");
        Ok(price)
    }

    pub async fn delete(&self, id: Uuid, correlation_id: Option<String>) -> AppResult<()> {
        let price = self.get(id).await?;

        if price.locked {
            return Err(AppError::Locked(format!(
                "price {id} is locked by saga {:?} and cannot be deleted",
                price.locked_by_saga_id
            )));
        }

        let mut tx = self.pool.begin().await?;
        db::delete(&mut tx, id).await?;
        events::price_deleted(&mut tx, &self.outbox, id, price.version, correlation_id).await?;
        tx.commit().await?;

        info!(price_id = %id, "price deleted");
        Ok(())
    }

    /// Lock a price for a saga. Idempotent for the same saga id, exclusive
    /// across sagas.
    pub async fn lock(&self, id: Uuid, saga_id: Uuid) -> AppResult<Price> {
        let price = self.get(id).await?;

        if price.locked && price.locked_by_saga_id == Some(saga_id) {
            return Ok(price);
        }

        let mut tx = self.pool.begin().await?;
        let changed = db::try_lock(&mut tx, id, saga_id).await?;
        if changed == 0 {
            return Err(AppError::Locked(format!(
                "price {id} is already locked by another saga: {:?}",
                price.locked_by_saga_id
            )));
        }
        events::price_locked(&mut tx, &self.outbox, id, saga_id, price.version).await?;
        tx.commit().await?;

        info!(price_id = %id, saga_id = %saga_id, "price locked");
        self.get(id).await
    }

    /// Release a price lock. A price that is not locked is a no-op.
    pub async fn unlock(&self, id: Uuid) -> AppResult<Price> {
        let price = self.get(id).await?;

        if !price.locked {
            return Ok(price);
        }

        let mut tx = self.pool.begin().await?;
        let changed = db::unlock(&mut tx, id).await?;
        if changed > 0 {
            events::price_unlocked(
                &mut tx,
                &self.outbox,
                id,
                price.locked_by_saga_id,
                price.version,
            )
            .await?;
        }
        tx.commit().await?;

        info!(price_id = %id, "price unlocked");
        self.get(id).await
    }
}
