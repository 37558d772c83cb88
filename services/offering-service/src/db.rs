//! Offering repository. Rows are mapped by hand because the lifecycle
//! status is stored as text.

use std::str::FromStr;

use error_types::AppResult;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::domain::{LifecycleStatus, Offering};

const COLUMNS: &str = "id, name, description, specification_ids, pricing_ids, sales_channels, \
                       lifecycle_status, version, created_at, updated_at, published_at, retired_at";

fn offering_from_row(row: PgRow) -> AppResult<Offering> {
    let status_text: String = row.try_get("lifecycle_status")?;
    Ok(Offering {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        specification_ids: row.try_get("specification_ids")?,
        pricing_ids: row.try_get("pricing_ids")?,
        sales_channels: row.try_get("sales_channels")?,
        lifecycle_status: LifecycleStatus::from_str(&status_text)?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        published_at: row.try_get("published_at")?,
        retired_at: row.try_get("retired_at")?,
    })
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> AppResult<Option<Offering>> {
    let row = sqlx::query(&format!("SELECT {COLUMNS} FROM offerings WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(offering_from_row).transpose()
}

pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> AppResult<Vec<Offering>> {
    let rows = sqlx::query(&format!(
        "SELECT {COLUMNS} FROM offerings ORDER BY created_at ASC LIMIT $1 OFFSET $2"
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(offering_from_row).collect()
}

pub async fn insert(tx: &mut Transaction<'_, Postgres>, offering: &Offering) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO offerings (
            id, name, description, specification_ids, pricing_ids, sales_channels,
            lifecycle_status, version, created_at, updated_at, published_at, retired_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(offering.id)
    .bind(&offering.name)
    .bind(&offering.description)
    .bind(&offering.specification_ids)
    .bind(&offering.pricing_ids)
    .bind(&offering.sales_channels)
    .bind(offering.lifecycle_status.as_str())
    .bind(offering.version)
    .bind(offering.created_at)
    .bind(offering.updated_at)
    .bind(offering.published_at)
    .bind(offering.retired_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn update(tx: &mut Transaction<'_, Postgres>, offering: &Offering) -> AppResult<()> {
    sqlx::query(
        r#"
        UPDATE offerings
        SET name = $2, description = $3, specification_ids = $4, pricing_ids = $5,
            sales_channels = $6, lifecycle_status = $7, version = $8, updated_at = $9,
            published_at = $10, retired_at = $11
        WHERE id = $1
        "#,
    )
    .bind(offering.id)
    .bind(&offering.name)
    .bind(&offering.description)
    .bind(&offering.specification_ids)
    .bind(&offering.pricing_ids)
    .bind(&offering.sales_channels)
    .bind(offering.lifecycle_status.as_str())
    .bind(offering.version)
    .bind(offering.updated_at)
    .bind(offering.published_at)
    .bind(offering.retired_at)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> AppResult<()> {
    sqlx::query("DELETE FROM offerings WHERE id = $1")
        .bind(id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}
