use shared_types::{AlertHistory, AppError};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "id, alert_rule_id, triggered_at, log_count, notified, error";

/// True when the rule already fired within its window. Keeps repeated
/// evaluator ticks from re-alerting on the same burst.
pub async fn recent_exists(
    pool: &Pool<Postgres>,
    alert_rule_id: Uuid,
    window_minutes: i32,
) -> Result<bool, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM alert_history
        WHERE alert_rule_id = $1
          AND triggered_at > NOW() - make_interval(mins => $2)
        "#,
    )
    .bind(alert_rule_id)
    .bind(window_minutes)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(count > 0)
}

pub async fn create(
    pool: &Pool<Postgres>,
    alert_rule_id: Uuid,
    log_count: i64,
) -> Result<AlertHistory, AppError> {
    sqlx::query_as::<_, AlertHistory>(&format!(
        r#"
        INSERT INTO alert_history (alert_rule_id, log_count)
        VALUES ($1, $2)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(alert_rule_id)
    .bind(log_count)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Mark a history row notified. An error string (e.g. a webhook failure)
/// is recorded when given and preserved otherwise.
pub async fn mark_as_notified(
    pool: &Pool<Postgres>,
    id: Uuid,
    error: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE alert_history SET notified = TRUE, error = COALESCE($2, error) WHERE id = $1")
        .bind(id)
        .bind(error)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

pub async fn find_by_id(
    pool: &Pool<Postgres>,
    id: Uuid,
) -> Result<Option<AlertHistory>, AppError> {
    sqlx::query_as::<_, AlertHistory>(&format!(
        "SELECT {COLUMNS} FROM alert_history WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}
