//! User repository.

use error_types::{AppError, AppResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

pub async fn find_by_username(pool: &PgPool, username: &str) -> AppResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, username, password_hash, role, created_at
        FROM users
        WHERE username = $1
        "#,
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Insert a user unless the username is already taken.
pub async fn ensure_user(
    pool: &PgPool,
    username: &str,
    password_hash: &str,
    role: &str,
) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, username, password_hash, role)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (username) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(username)
    .bind(password_hash)
    .bind(role)
    .execute(pool)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(())
}
