//! Startup provisioning and the default-user lookup behind auth-free mode.

use shared_types::{AppError, User};

use crate::db::AppState;
use crate::repo;

/// Ensure the invariants the rest of the system assumes: the local
/// provider row exists and is enabled. Runs once at startup.
pub async fn run(state: &AppState) -> Result<(), AppError> {
    let provider = repo::providers::ensure_local(&state.pool).await?;
    tracing::info!(provider_id = %provider.id, "Local auth provider ready");
    Ok(())
}

/// Resolve the configured default user for auth-free mode. Returns None
/// when `auth.default_user_id` is unset, dangling, or disabled — callers
/// answer 503 in that case.
pub async fn default_user(state: &AppState) -> Result<Option<User>, AppError> {
    let Some(user_id) = state.settings.default_user_id().await else {
        return Ok(None);
    };
    let user = repo::users::find_by_id(&state.pool, user_id).await?;
    Ok(user.filter(|u| !u.disabled))
}
