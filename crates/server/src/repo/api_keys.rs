use sha2::{Digest, Sha256};
use shared_types::{ApiKey, AppError};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

/// Tenant context attached to a request after API-key authentication.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    pub api_key_id: Uuid,
    pub project_id: Uuid,
    pub organization_id: Uuid,
}

/// SHA-256 of the plaintext key, hex encoded. API keys are high-entropy
/// random; no password KDF is involved.
pub fn hash_key(plaintext: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plaintext.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Resolve a plaintext API key to its tenant context. Revoked keys and
/// unknown hashes both come back as None.
pub async fn authenticate(
    pool: &Pool<Postgres>,
    plaintext: &str,
) -> Result<Option<ApiKeyContext>, AppError> {
    let hash = hash_key(plaintext);

    let row = sqlx::query_as::<_, (Uuid, Uuid, Uuid)>(
        r#"
        SELECT k.id, k.project_id, p.organization_id
        FROM api_keys k
        JOIN projects p ON p.id = k.project_id
        WHERE k.key_hash = $1 AND NOT k.revoked
        "#,
    )
    .bind(hash)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok(row.map(|(api_key_id, project_id, organization_id)| ApiKeyContext {
        api_key_id,
        project_id,
        organization_id,
    }))
}

/// Best-effort last-used bump; failures are logged, never surfaced.
pub async fn touch_last_used(pool: &Pool<Postgres>, id: Uuid) {
    if let Err(e) = sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
    {
        tracing::warn!(error = %e, api_key_id = %id, "Failed to update API key last_used_at");
    }
}

pub async fn create(
    pool: &Pool<Postgres>,
    project_id: Uuid,
    name: &str,
    plaintext: &str,
) -> Result<ApiKey, AppError> {
    sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (project_id, name, key_hash)
        VALUES ($1, $2, $3)
        RETURNING id, project_id, name, key_hash, last_used_at, revoked, created_at
        "#,
    )
    .bind(project_id)
    .bind(name)
    .bind(hash_key(plaintext))
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_key_is_sha256_hex() {
        let hash = hash_key("some-api-key");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, hash_key("some-api-key"));
        assert_ne!(hash, hash_key("other-api-key"));
    }
}
