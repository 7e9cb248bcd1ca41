use shared_types::{AppError, UserIdentity};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "id, user_id, provider_id, provider_user_id, created_at";

pub async fn find(
    pool: &Pool<Postgres>,
    provider_id: Uuid,
    provider_user_id: &str,
) -> Result<Option<UserIdentity>, AppError> {
    sqlx::query_as::<_, UserIdentity>(&format!(
        "SELECT {COLUMNS} FROM user_identities WHERE provider_id = $1 AND provider_user_id = $2"
    ))
    .bind(provider_id)
    .bind(provider_user_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn find_by_id(
    pool: &Pool<Postgres>,
    id: Uuid,
) -> Result<Option<UserIdentity>, AppError> {
    sqlx::query_as::<_, UserIdentity>(&format!(
        "SELECT {COLUMNS} FROM user_identities WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn list_for_user(
    pool: &Pool<Postgres>,
    user_id: Uuid,
) -> Result<Vec<UserIdentity>, AppError> {
    sqlx::query_as::<_, UserIdentity>(&format!(
        "SELECT {COLUMNS} FROM user_identities WHERE user_id = $1 ORDER BY created_at"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn count_for_user(pool: &Pool<Postgres>, user_id: Uuid) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_identities WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn create(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    provider_id: Uuid,
    provider_user_id: &str,
) -> Result<UserIdentity, AppError> {
    sqlx::query_as::<_, UserIdentity>(&format!(
        r#"
        INSERT INTO user_identities (user_id, provider_id, provider_user_id)
        VALUES ($1, $2, $3)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(provider_id)
    .bind(provider_user_id)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn delete(pool: &Pool<Postgres>, id: Uuid) -> Result<(), AppError> {
    sqlx::query("DELETE FROM user_identities WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

/// Count users holding an identity on the given provider. Providers with
/// linked users cannot be deleted.
pub async fn count_for_provider(pool: &Pool<Postgres>, provider_id: Uuid) -> Result<i64, AppError> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM user_identities WHERE provider_id = $1")
        .bind(provider_id)
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}
