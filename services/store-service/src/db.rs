//! Document-collection repository. The projector is the only writer here;
//! no other component touches these tables.

use error_types::AppResult;
use serde_json::json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Entity class of a reference-change event, selecting the nested document
/// path fan-out queries match on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefEntity {
    Characteristic,
    Specification,
    Price,
}

impl RefEntity {
    /// Containment probe matching documents that reference the entity id at
    /// the nested path for this entity class.
    fn containment_probe(&self, id: Uuid) -> serde_json::Value {
        match self {
            RefEntity::Characteristic => json!({
                "specifications": [{ "characteristics": [{ "id": id }] }]
            }),
            RefEntity::Specification => json!({
                "specifications": [{ "id": id }]
            }),
            RefEntity::Price => json!({
                "pricing": [{ "id": id }]
            }),
        }
    }
}

pub async fn upsert_document(
    pool: &PgPool,
    id: Uuid,
    document: &serde_json::Value,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO published_offerings (id, document, synced_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (id) DO UPDATE SET document = EXCLUDED.document, synced_at = NOW()
        "#,
    )
    .bind(id)
    .bind(document)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns true when a document existed and was removed.
pub async fn delete_document(pool: &PgPool, id: Uuid) -> AppResult<bool> {
    let result = sqlx::query("DELETE FROM published_offerings WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn get_document(pool: &PgPool, id: Uuid) -> AppResult<Option<serde_json::Value>> {
    let row = sqlx::query("SELECT document FROM published_offerings WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| r.try_get("document").map_err(Into::into))
        .transpose()
}

pub async fn list_documents(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<serde_json::Value>> {
    let rows = sqlx::query(
        r#"
        SELECT document FROM published_offerings
        ORDER BY synced_at DESC
        LIMIT $1 OFFSET $2
        "#,
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|r| r.try_get("document").map_err(Into::into))
        .collect()
}

/// Offering ids whose documents reference the changed entity.
pub async fn find_referencing_offerings(
    pool: &PgPool,
    entity: RefEntity,
    entity_id: Uuid,
) -> AppResult<Vec<Uuid>> {
    let probe = entity.containment_probe(entity_id);

    let rows = sqlx::query("SELECT id FROM published_offerings WHERE document @> $1")
        .bind(probe)
        .fetch_all(pool)
        .await?;

    rows.into_iter()
        .map(|r| r.try_get("id").map_err(Into::into))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn containment_probe_shapes_follow_document_nesting() {
        let id = Uuid::new_v4();

        let probe = RefEntity::Characteristic.containment_probe(id);
        assert_eq!(
            probe["specifications"][0]["characteristics"][0]["id"],
            json!(id)
        );

        let probe = RefEntity::Specification.containment_probe(id);
        assert_eq!(probe["specifications"][0]["id"], json!(id));

        let probe = RefEntity::Price.containment_probe(id);
        assert_eq!(probe["pricing"][0]["id"], json!(id));
    }
}
