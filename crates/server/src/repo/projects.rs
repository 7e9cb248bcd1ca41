use shared_types::{AppError, Project};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "id, organization_id, name, created_at";

pub async fn find_by_id(pool: &Pool<Postgres>, id: Uuid) -> Result<Option<Project>, AppError> {
    sqlx::query_as::<_, Project>(&format!("SELECT {COLUMNS} FROM projects WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

pub async fn create(
    pool: &Pool<Postgres>,
    organization_id: Uuid,
    name: &str,
) -> Result<Project, AppError> {
    sqlx::query_as::<_, Project>(&format!(
        r#"
        INSERT INTO projects (organization_id, name)
        VALUES ($1, $2)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(organization_id)
    .bind(name)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn ids_for_organization(
    pool: &Pool<Postgres>,
    organization_id: Uuid,
) -> Result<Vec<Uuid>, AppError> {
    sqlx::query_scalar::<_, Uuid>("SELECT id FROM projects WHERE organization_id = $1")
        .bind(organization_id)
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}
