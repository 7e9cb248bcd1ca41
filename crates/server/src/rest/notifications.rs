//! In-app notification endpoints.

use axum::extract::{Path, State};
use axum::Json;
use shared_types::{AppError, Notification};
use uuid::Uuid;

use crate::auth::extractors::AuthRequired;
use crate::db::AppState;
use crate::repo;

#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    responses(
        (status = 200, description = "Recent notifications", body = [Notification])
    ),
    tag = "notifications"
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
) -> Result<Json<Vec<Notification>>, AppError> {
    let notifications = repo::notifications::list_for_user(&state.pool, user.id, 100).await?;
    Ok(Json(notifications))
}

#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    params(("id" = Uuid, Path, description = "Notification id")),
    responses(
        (status = 200, description = "Marked read"),
        (status = 404, description = "Not found")
    ),
    tag = "notifications"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let updated = repo::notifications::mark_read(&state.pool, user.id, id).await?;
    if !updated {
        return Err(AppError::not_found("Notification not found"));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
