use chrono::{Duration, Utc};
use rand::RngCore;
use shared_types::{AppError, Session, User};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

/// Session lifetime: 30 days from creation.
const SESSION_DAYS: i64 = 30;

/// Generate a 256-bit random token, hex encoded. Opaque to the client and
/// compared verbatim on validation.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

pub async fn create(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Session, AppError> {
    let token = generate_token();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);

    sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO sessions (user_id, token, expires_at)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, token, created_at, expires_at
        "#,
    )
    .bind(user_id)
    .bind(token)
    .bind(expires_at)
    .fetch_one(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Resolve a session token to its user. Returns None when the token is
/// unknown, expired, or the user is disabled.
pub async fn validate(pool: &Pool<Postgres>, token: &str) -> Result<Option<User>, AppError> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.email, u.display_name, u.password_hash, u.is_admin,
               u.disabled, u.created_at, u.last_login_at
        FROM sessions s
        JOIN users u ON u.id = s.user_id
        WHERE s.token = $1 AND s.expires_at > NOW() AND NOT u.disabled
        "#,
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

pub async fn delete_by_token(pool: &Pool<Postgres>, token: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM sessions WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}
