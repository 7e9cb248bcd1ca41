use shared_types::{AppError, OrgRole, Organization};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "id, name, slug, owner_id, created_at";

pub async fn create(
    pool: &Pool<Postgres>,
    name: &str,
    slug: &str,
    owner_id: Uuid,
) -> Result<Organization, AppError> {
    let org = sqlx::query_as::<_, Organization>(&format!(
        r#"
        INSERT INTO organizations (name, slug, owner_id)
        VALUES ($1, $2, $3)
        RETURNING {COLUMNS}
        "#
    ))
    .bind(name)
    .bind(slug)
    .bind(owner_id)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    // Owner is implicitly a member.
    sqlx::query(
        r#"
        INSERT INTO organization_members (user_id, organization_id, role)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, organization_id) DO NOTHING
        "#,
    )
    .bind(owner_id)
    .bind(org.id)
    .bind(OrgRole::Owner.as_str())
    .execute(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(org)
}

pub async fn is_member(
    pool: &Pool<Postgres>,
    user_id: Uuid,
    organization_id: Uuid,
) -> Result<bool, AppError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM organization_members WHERE user_id = $1 AND organization_id = $2",
    )
    .bind(user_id)
    .bind(organization_id)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(count > 0)
}

pub async fn member_user_ids(
    pool: &Pool<Postgres>,
    organization_id: Uuid,
) -> Result<Vec<Uuid>, AppError> {
    sqlx::query_scalar::<_, Uuid>(
        "SELECT user_id FROM organization_members WHERE organization_id = $1",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}
