use shared_types::{AppError, SigmaRule};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "id, organization_id, project_id, sigma_id, title, level, status, enabled, \
                       logsource, detection, email_recipients, webhook_url, alert_rule_id, \
                       conversion_metadata, created_at";

/// Enabled rules in scope for a detection job: the organization's global
/// rules plus the ones pinned to the given project.
pub async fn list_enabled_in_scope(
    pool: &Pool<Postgres>,
    organization_id: Uuid,
    project_id: Option<Uuid>,
) -> Result<Vec<SigmaRule>, AppError> {
    sqlx::query_as::<_, SigmaRule>(&format!(
        r#"
        SELECT {COLUMNS} FROM sigma_rules
        WHERE organization_id = $1 AND enabled
          AND (project_id IS NULL OR project_id = $2)
        ORDER BY created_at
        "#
    ))
    .bind(organization_id)
    .bind(project_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}
