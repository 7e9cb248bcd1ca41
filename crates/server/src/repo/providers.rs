use shared_types::{AppError, AuthProvider};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "id, kind, slug, name, icon, enabled, is_default, display_order, \
                       allow_auto_register, config, created_at";

pub async fn list(pool: &Pool<Postgres>) -> Result<Vec<AuthProvider>, AppError> {
    sqlx::query_as::<_, AuthProvider>(&format!(
        "SELECT {COLUMNS} FROM auth_providers ORDER BY display_order, created_at"
    ))
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn list_enabled(pool: &Pool<Postgres>) -> Result<Vec<AuthProvider>, AppError> {
    sqlx::query_as::<_, AuthProvider>(&format!(
        "SELECT {COLUMNS} FROM auth_providers WHERE enabled ORDER BY display_order, created_at"
    ))
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<AuthProvider>, AppError> {
    sqlx::query_as::<_, AuthProvider>(&format!(
        "SELECT {COLUMNS} FROM auth_providers WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn find_by_slug(
    pool: &Pool<Postgres>,
    slug: &str,
) -> Result<Option<AuthProvider>, AppError> {
    sqlx::query_as::<_, AuthProvider>(&format!(
        "SELECT {COLUMNS} FROM auth_providers WHERE slug = $1"
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    pool: &Pool<Postgres>,
    kind: &str,
    slug: &str,
    name: &str,
    icon: Option<&str>,
    enabled: bool,
    is_default: bool,
    display_order: i32,
    allow_auto_register: bool,
    config: &serde_json::Value,
) -> Result<AuthProvider, AppError> {
    sqlx::query_as::<_, AuthProvider>(&format!(
        r#"
        INSERT INTO auth_providers
            (kind, slug, name, icon, enabled, is_default, display_order, allow_auto_register, config)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(kind)
    .bind(slug)
    .bind(name)
    .bind(icon)
    .bind(enabled)
    .bind(is_default)
    .bind(display_order)
    .bind(allow_auto_register)
    .bind(config)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

#[allow(clippy::too_many_arguments)]
pub async fn update(
    pool: &Pool<Postgres>,
    id: Uuid,
    name: &str,
    icon: Option<&str>,
    enabled: bool,
    is_default: bool,
    display_order: i32,
    allow_auto_register: bool,
    config: &serde_json::Value,
) -> Result<Option<AuthProvider>, AppError> {
    sqlx::query_as::<_, AuthProvider>(&format!(
        r#"
        UPDATE auth_providers
        SET name = $2, icon = $3, enabled = $4, is_default = $5,
            display_order = $6, allow_auto_register = $7, config = $8
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(name)
    .bind(icon)
    .bind(enabled)
    .bind(is_default)
    .bind(display_order)
    .bind(allow_auto_register)
    .bind(config)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn delete(pool: &Pool<Postgres>, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM auth_providers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected() > 0)
}

/// Clear the default flag on every provider except `keep`. Run before
/// marking a new default.
pub async fn clear_default_except(pool: &Pool<Postgres>, keep: Uuid) -> Result<(), AppError> {
    sqlx::query("UPDATE auth_providers SET is_default = FALSE WHERE id <> $1")
        .bind(keep)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

/// Apply a display order. Runs N updates without a transaction; display
/// order is not a safety invariant.
pub async fn reorder(pool: &Pool<Postgres>, ids: &[Uuid]) -> Result<(), AppError> {
    for (position, id) in ids.iter().enumerate() {
        sqlx::query("UPDATE auth_providers SET display_order = $2 WHERE id = $1")
            .bind(id)
            .bind(position as i32)
            .execute(pool)
            .await
            .map_err(SqlxErrorExt::into_app_error)?;
    }
    Ok(())
}

/// Ensure the built-in local provider exists and is enabled. Called at
/// startup; the local provider cannot be deleted or disabled.
pub async fn ensure_local(pool: &Pool<Postgres>) -> Result<AuthProvider, AppError> {
    if let Some(provider) = find_by_slug(pool, "local").await? {
        if !provider.enabled {
            sqlx::query("UPDATE auth_providers SET enabled = TRUE WHERE id = $1")
                .bind(provider.id)
                .execute(pool)
                .await
                .map_err(SqlxErrorExt::into_app_error)?;
        }
        return Ok(provider);
    }

    create(
        pool,
        "local",
        "local",
        "Email & Password",
        None,
        true,
        true,
        0,
        true,
        &serde_json::json!({}),
    )
    .await
}
