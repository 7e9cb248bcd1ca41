use shared_types::{normalize_email, AppError, User};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str =
    "id, email, display_name, password_hash, is_admin, disabled, created_at, last_login_at";

pub async fn find_by_id(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn find_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE email = $1"))
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn create(
    pool: &Pool<Postgres>,
    email: &str,
    display_name: &str,
    password_hash: Option<&str>,
    is_admin: bool,
) -> Result<User, AppError> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (email, display_name, password_hash, is_admin)
        VALUES ($1, $2, $3, $4)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(normalize_email(email))
    .bind(display_name)
    .bind(password_hash)
    .bind(is_admin)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn touch_last_login(pool: &Pool<Postgres>, id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

/// Clear the bcrypt hash, leaving the account SSO-only. Used when the
/// local identity is unlinked.
pub async fn clear_password_hash(pool: &Pool<Postgres>, id: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE users SET password_hash = NULL WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}
