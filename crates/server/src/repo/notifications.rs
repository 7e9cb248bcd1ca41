use shared_types::{AppError, Notification};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "id, user_id, title, body, read, created_at";

pub async fn create(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    title: &str,
    body: &str,
) -> Result<Notification, AppError> {
    sqlx::query_as::<_, Notification>(&format!(
        r#"
        INSERT INTO notifications (user_id, title, body)
        VALUES ($1, $2, $3)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(title)
    .bind(body)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn list_for_user(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    limit: i64,
) -> Result<Vec<Notification>, AppError> {
    sqlx::query_as::<_, Notification>(&format!(
        "SELECT {COLUMNS} FROM notifications WHERE user_id = $1 \
         ORDER BY created_at DESC LIMIT $2"
    ))
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn mark_read(pool: &Pool<Postgres>, user_id: Uuid, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected() > 0)
}
