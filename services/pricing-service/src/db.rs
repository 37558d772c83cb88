//! Price repository.

use error_types::AppResult;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::Price;

const COLUMNS: &str =
    "id, name, value, unit, currency, locked, locked_by_saga_id, version, created_at, updated_at";

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> AppResult<Option<Price>> {
    let price = sqlx::query_as::<_, Price>(&format!(
        "SELECT {COLUMNS} FROM prices WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(price)
}

pub async fn find_by_name(pool: &PgPool, name: &str) -> AppResult<Option<Price>> {
    let price = sqlx::query_as::<_, Price>(&format!(
        "SELECT {COLUMNS} FROM prices WHERE name = $1"
    ))
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(price)
}

pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> AppResult<Vec<Price>> {
    let prices = sqlx::query_as::<_, Price>(&format!(
        "SELECT {COLUMNS} FROM prices ORDER BY created_at ASC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(prices)
}

pub async fn insert(tx: &mut Transaction<'_, Postgres>, price: &Price) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO prices (id, name, value, unit, currency, locked, locked_by_saga_id, version, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(price.id)
    .bind(&price.name)
    .bind(price.value)
    .bind(&price.unit)
    .bind(&price.currency)
    .bind(price.locked)
    .bind(price.locked_by_saga_id)
    .bind(price.version)
    .bind(price.created_at)
    .bind(price.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn update(tx: &mut Transaction<'_, Postgres>, price: &Price) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE prices
        SET name = $2, value = $3, unit = $4, currency = $5, version = $6, updated_at = $7
        WHERE id = $1
        "#,
    )
    .bind(price.id)
    .bind(&price.name)
    .bind(price.value)
    .bind(&price.unit)
    .bind(&price.currency)
    .bind(price.version)
    .bind(price.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM prices WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

/// Acquire the database-level exclusive lock flag.
///
/// Atomic across sagas: the row only flips when it is unlocked or already
/// held by the same saga. Returns the number of rows changed (0 means the
/// price is held by another saga or missing).
pub async fn try_lock(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    saga_id: Uuid,
) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE prices
        SET locked = TRUE, locked_by_saga_id = $2, updated_at = NOW()
        WHERE id = $1 AND (locked = FALSE OR locked_by_saga_id = $2)
        "#,
    )
    .bind(id)
    .bind(saga_id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}

pub async fn unlock(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> AppResult<u64> {
    let result = sqlx::query(
        r#"
        UPDATE prices
        SET locked = FALSE, locked_by_saga_id = NULL, updated_at = NOW()
        WHERE id = $1 AND locked = TRUE
        "#,
    )
    .bind(id)
    .execute(&mut **tx)
    .await?;

    Ok(result.rows_affected())
}
