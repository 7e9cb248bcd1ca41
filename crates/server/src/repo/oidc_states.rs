use shared_types::{AppError, OidcState};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

/// OIDC state lifetime, seconds. Mirrored as the cache TTL.
pub const STATE_TTL_SECS: i64 = 300;

pub async fn create(
    pool: &Pool<Postgres>,
    state: &str,
    nonce: &str,
    provider_id: Uuid,
    redirect_uri: &str,
    code_verifier: &str,
) -> Result<OidcState, AppError> {
    sqlx::query_as::<_, OidcState>(
        r#"
        INSERT INTO oidc_states (state, nonce, provider_id, redirect_uri, code_verifier)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING state, nonce, provider_id, redirect_uri, code_verifier, created_at
        "#,
    )
    .bind(state)
    .bind(nonce)
    .bind(provider_id)
    .bind(redirect_uri)
    .bind(code_verifier)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Fetch a pending state that has not outlived its TTL.
pub async fn find_valid(pool: &Pool<Postgres>, state: &str) -> Result<Option<OidcState>, AppError> {
    sqlx::query_as::<_, OidcState>(
        r#"
        SELECT state, nonce, provider_id, redirect_uri, code_verifier, created_at
        FROM oidc_states
        WHERE state = $1 AND created_at > NOW() - make_interval(secs => $2)
        "#,
    )
    .bind(state)
    .bind(STATE_TTL_SECS as f64)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn delete(pool: &Pool<Postgres>, state: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM oidc_states WHERE state = $1")
        .bind(state)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

/// Drop expired states. Called opportunistically from the authorize path.
pub async fn prune_expired(pool: &Pool<Postgres>) -> Result<(), AppError> {
    sqlx::query("DELETE FROM oidc_states WHERE created_at <= NOW() - make_interval(secs => $1)")
        .bind(STATE_TTL_SECS as f64)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}
