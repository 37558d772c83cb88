//! Specification and characteristic-cache repositories.

use error_types::AppResult;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::models::{CachedCharacteristic, Specification};

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> AppResult<Option<Specification>> {
    let spec = sqlx::query_as::<_, Specification>(
        r#"
        SELECT id, name, characteristic_ids, version, created_at, updated_at
        FROM specifications
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(spec)
}

pub async fn find_by_name(pool: &PgPool, name: &str) -> AppResult<Option<Specification>> {
    let spec = sqlx::query_as::<_, Specification>(
        r#"
        SELECT id, name, characteristic_ids, version, created_at, updated_at
        FROM specifications
        WHERE name = $1
        "#,
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(spec)
}

pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> AppResult<Vec<Specification>> {
    let specs = sqlx::query_as::<_, Specification>(
        r#"
        SELECT id, name, characteristic_ids, version, created_at, updated_at
        FROM specifications
        ORDER BY created_at ASC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(specs)
}

pub async fn insert(tx: &mut Transaction<'_, Postgres>, spec: &Specification) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO specifications (id, name, characteristic_ids, version, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(spec.id)
    .bind(&spec.name)
    .bind(&spec.characteristic_ids)
    .bind(spec.version)
    .bind(spec.created_at)
    .bind(spec.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn update(tx: &mut Transaction<'_, Postgres>, spec: &Specification) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE specifications
        SET name = $2, characteristic_ids = $3, version = $4, updated_at = $5
        WHERE id = $1
        "#,
    )
    .bind(spec.id)
    .bind(&spec.name)
    .bind(&spec.characteristic_ids)
    .bind(spec.version)
    .bind(spec.updated_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM specifications WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

// --- characteristic cache -------------------------------------------------

pub mod cache {
    use super::*;

    pub async fn upsert(pool: &PgPool, id: Uuid, name: &str, version: i64) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cached_characteristics (id, name, version, synced_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, version = EXCLUDED.version, synced_at = NOW()
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(version)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn remove(pool: &PgPool, id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM cached_characteristics WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(())
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> AppResult<Option<CachedCharacteristic>> {
        let cached = sqlx::query_as::<_, CachedCharacteristic>(
            r#"
            SELECT id, name, version, synced_at
            FROM cached_characteristics
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(cached)
    }

    /// Subset of the given ids that exist in the cache.
    pub async fn existing_ids(pool: &PgPool, ids: &[Uuid]) -> AppResult<Vec<Uuid>> {
        let rows = sqlx::query(
            r#"
            SELECT id FROM cached_characteristics WHERE id = ANY($1)
            "#,
        )
        .bind(ids)
        .fetch_all(pool)
        .await?;

        rows.into_iter()
            .map(|row| row.try_get("id").map_err(Into::into))
            .collect()
    }
}
