use shared_types::{AlertRule, AppError, CreateAlertRuleRequest, UpdateAlertRuleRequest};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "id, organization_id, project_id, name, service, levels, \
                       time_window_minutes, threshold, enabled, email_recipients, webhook_url, \
                       created_at";

pub async fn list_enabled(pool: &Pool<Postgres>) -> Result<Vec<AlertRule>, AppError> {
    sqlx::query_as::<_, AlertRule>(&format!(
        "SELECT {COLUMNS} FROM alert_rules WHERE enabled ORDER BY created_at"
    ))
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn list_for_organization(
    pool: &Pool<Postgres>,
    organization_id: Uuid,
) -> Result<Vec<AlertRule>, AppError> {
    sqlx::query_as::<_, AlertRule>(&format!(
        "SELECT {COLUMNS} FROM alert_rules WHERE organization_id = $1 ORDER BY created_at"
    ))
    .bind(organization_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn find_by_id(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<AlertRule>, AppError> {
    sqlx::query_as::<_, AlertRule>(&format!("SELECT {COLUMNS} FROM alert_rules WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn create(
    pool: &Pool<Postgres>,
    req: &CreateAlertRuleRequest,
) -> Result<AlertRule, AppError> {
    sqlx::query_as::<_, AlertRule>(&format!(
        r#"
        INSERT INTO alert_rules
            (organization_id, project_id, name, service, levels, time_window_minutes,
             threshold, enabled, email_recipients, webhook_url)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(req.organization_id)
    .bind(req.project_id)
    .bind(&req.name)
    .bind(&req.service)
    .bind(&req.levels)
    .bind(req.time_window_minutes)
    .bind(req.threshold)
    .bind(req.enabled.unwrap_or(true))
    .bind(req.email_recipients.clone().unwrap_or_default())
    .bind(&req.webhook_url)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn update(
    pool: &Pool<Postgres>,
    id: Uuid,
    existing: &AlertRule,
    req: &UpdateAlertRuleRequest,
) -> Result<Option<AlertRule>, AppError> {
    sqlx::query_as::<_, AlertRule>(&format!(
        r#"
        UPDATE alert_rules
        SET name = $2, service = $3, levels = $4, time_window_minutes = $5,
            threshold = $6, enabled = $7, email_recipients = $8, webhook_url = $9
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    ))
    .bind(id)
    .bind(req.name.as_ref().unwrap_or(&existing.name))
    .bind(req.service.as_ref().or(existing.service.as_ref()))
    .bind(req.levels.as_ref().unwrap_or(&existing.levels))
    .bind(req.time_window_minutes.unwrap_or(existing.time_window_minutes))
    .bind(req.threshold.unwrap_or(existing.threshold))
    .bind(req.enabled.unwrap_or(existing.enabled))
    .bind(req.email_recipients.as_ref().unwrap_or(&existing.email_recipients))
    .bind(req.webhook_url.as_ref().or(existing.webhook_url.as_ref()))
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn delete(pool: &Pool<Postgres>, id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM alert_rules WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(result.rows_affected() > 0)
}
