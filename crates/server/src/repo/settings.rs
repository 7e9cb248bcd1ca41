use shared_types::{AppError, SystemSetting};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "key, value, updated_by, updated_at";

pub async fn find(pool: &Pool<Postgres>, key: &str) -> Result<Option<SystemSetting>, AppError> {
    sqlx::query_as::<_, SystemSetting>(&format!(
        "SELECT {COLUMNS} FROM system_settings WHERE key = $1"
    ))
    .bind(key)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn list(pool: &Pool<Postgres>) -> Result<Vec<SystemSetting>, AppError> {
    sqlx::query_as::<_, SystemSetting>(&format!(
        "SELECT {COLUMNS} FROM system_settings ORDER BY key"
    ))
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn upsert(
    pool: &Pool<Postgres>,
    key: &str,
    value: &serde_json::Value,
    updated_by: Option<Uuid>,
) -> Result<SystemSetting, AppError> {
    sqlx::query_as::<_, SystemSetting>(&format!(
        r#"
        INSERT INTO system_settings (key, value, updated_by)
        VALUES ($1, $2, $3)
        ON CONFLICT (key) DO UPDATE SET
            value = EXCLUDED.value,
            updated_by = EXCLUDED.updated_by,
            updated_at = NOW()
        RETURNING {COLUMNS}
        "#
    ))
    .bind(key)
    .bind(value)
    .bind(updated_by)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn delete(pool: &Pool<Postgres>, key: &str) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM system_settings WHERE key = $1")
        .bind(key)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected() > 0)
}
