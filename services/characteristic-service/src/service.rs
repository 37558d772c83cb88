//! Characteristic write operations.
//!
//! Every mutation follows the writer shell: open a transaction, enforce the
//! invariants, mutate the entity and bump its version, insert exactly one
//! outbox row, commit. Delivery is the dispatcher's job.

use error_types::{AppError, AppResult};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use transactional_outbox::SqlxOutboxRepository;
use uuid::Uuid;

use crate::db;
use crate::events;
use crate::models::{Characteristic, CreateCharacteristic, UpdateCharacteristic};

pub struct CharacteristicService {
    pool: PgPool,
    outbox: Arc<SqlxOutboxRepository>,
}

impl CharacteristicService {
    pub fn new(pool: PgPool, outbox: Arc<SqlxOutboxRepository>) -> Self {
        Self { pool, outbox }
    }

    pub async fn create(
        &self,
        input: CreateCharacteristic,
        correlation_id: Option<String>,
    ) -> AppResult<Characteristic> {
        if db::find_by_name(&self.pool, &input.name).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "characteristic with name '{}' already exists",
                input.name
            )));
        }

        let characteristic = Characteristic::new(input.name, input.value, input.unit);

        let mut tx = self.pool.begin().await?;
        db::insert(&mut tx, &characteristic).await?;
        events::characteristic_created(&mut tx, &self.outbox, &characteristic, correlation_id)
            .await?;
        tx.commit().await?;

        info!(characteristic_id = %characteristic.id, "characteristic created");
        Ok(characteristic)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Characteristic> {
        db::find_by_id(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("characteristic {id} not found")))
    }

    pub async fn list(&self, limit: i64, offset: i64) -> AppResult<Vec<Characteristic>> {
        db::list(&self.pool, limit, offset).await
    }

    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateCharacteristic,
        correlation_id: Option<String>,
    ) -> AppResult<Characteristic> {
        let mut characteristic = self.get(id).await?;

        if input.name != characteristic.name {
            if db::find_by_name(&self.pool, &input.name).await?.is_some() {
                return Err(AppError::Conflict(format!(
                    "characteristic with name '{}' already exists",
                    input.name
                )));
            }
        }

        characteristic.apply_update(input);

        let mut tx = self.pool.begin().await?;
        db::update(&mut tx, &characteristic).await?;
        events::characteristic_updated(&mut tx, &self.outbox, &characteristic, correlation_id)
            .await?;
        tx.commit().await?;

        info!(characteristic_id = %characteristic.id, version = characteristic.version, "characteristic updated");
        Ok(characteristic)
    }

    pub async fn delete(&self, id: Uuid, correlation_id: Option<String>) -> AppResult<()> {
        let characteristic = self.get(id).await?;

        let mut tx = self.pool.begin().await?;
        db::delete(&mut tx, id).await?;
        events::characteristic_deleted(
            &mut tx,
            &self.outbox,
            id,
            characteristic.version,
            correlation_id,
        )
        .await?;
        tx.commit().await?;

        info!(characteristic_id = %id, "characteristic deleted");
        Ok(())
    }
}
