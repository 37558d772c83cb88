//! Characteristic repository. Mutations run inside the caller's transaction
//! so the outbox row commits with them.

use error_types::AppResult;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::models::Characteristic;

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> AppResult<Option<Characteristic>> {
    let characteristic = sqlx::query_as::<_, Characteristic>(
        r#"
        SELECT id, name, value, unit, version, created_at, updated_at
        FROM characteristics
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(characteristic)
}

pub async fn find_by_name(pool: &PgPool, name: &str) -> AppResult<Option<Characteristic>> {
    let characteristic = sqlx::query_as::<_, Characteristic>(
        r#"
        SELECT id, name, value, unit, version, created_at, updated_at
        FROM characteristics
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(characteristic)
}

pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> AppResult<Vec<Characteristic>> {
    let characteristics = sqlx::query_as::<_, Characteristic>(
        r#"
        SELECT id, name, value, unit, version, created_at, updated_at
        FROM characteristics
        ORDER BY created_at ASC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(characteristics)
}

pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    characteristic: &Characteristic,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO characteristics (id, name, value, unit, version, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(characteristic.id)
    .bind(&characteristic.name)
    .bind(&characteristic.value)
    .bind(&characteristic.unit)
    .bind(characteristic.version)
    .bind(characteristic.created_at)
    .bind(characteristic.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn update(
    tx: &mut Transaction<'_, Postgres>,
    characteristic: &Characteristic,
) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE characteristics
        SET name = $2, value = $3, unit = $4, version = $5, updated_at = $6
        WHERE id = $1
        "#,
    )
    .bind(characteristic.id)
    .bind(&characteristic.name)
    .bind(&characteristic.value)
    .bind(&characteristic.unit)
    .bind(characteristic.version)
    .bind(characteristic.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM characteristics WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
