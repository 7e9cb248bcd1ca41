//! Admin settings endpoints. Only the enumerated keys are accepted.

use axum::extract::{Path, State};
use axum::Json;
use serde_json::json;
use shared_types::{AppError, SettingKey, SettingUpdateRequest, SystemSetting};

use crate::auth::extractors::AdminRequired;
use crate::db::AppState;
use crate::repo;

// ---------------------------------------------------------------------------
// GET /api/v1/admin/settings
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/admin/settings",
    responses(
        (status = 200, description = "Every recognized setting with its effective value")
    ),
    tag = "admin"
)]
pub async fn list_settings(
    State(state): State<AppState>,
    AdminRequired(_admin): AdminRequired,
) -> Result<Json<serde_json::Value>, AppError> {
    let overrides = repo::settings::list(&state.pool).await?;
    let mut out = serde_json::Map::new();
    for key in SettingKey::ALL {
        let value = overrides
            .iter()
            .find(|row| row.key == key.as_str())
            .map(|row| row.value.clone())
            .unwrap_or_else(|| key.default_value());
        out.insert(key.as_str().to_string(), value);
    }
    Ok(Json(serde_json::Value::Object(out)))
}

// ---------------------------------------------------------------------------
// GET /api/v1/admin/settings/{key}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/admin/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Effective value"),
        (status = 400, description = "Unknown setting key")
    ),
    tag = "admin"
)]
pub async fn get_setting(
    State(state): State<AppState>,
    AdminRequired(_admin): AdminRequired,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let known = SettingKey::parse(&key)
        .ok_or_else(|| AppError::bad_request(format!("Unknown setting key: {key}")))?;
    let value = state.settings.get(known).await;
    Ok(Json(json!({ "key": known.as_str(), "value": value })))
}

// ---------------------------------------------------------------------------
// PUT /api/v1/admin/settings/{key}
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/api/v1/admin/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    request_body = SettingUpdateRequest,
    responses(
        (status = 200, description = "Setting written", body = SystemSetting),
        (status = 400, description = "Unknown setting key")
    ),
    tag = "admin"
)]
pub async fn put_setting(
    State(state): State<AppState>,
    AdminRequired(admin): AdminRequired,
    Path(key): Path<String>,
    Json(body): Json<SettingUpdateRequest>,
) -> Result<Json<SystemSetting>, AppError> {
    let row = state.settings.set(&key, body.value, Some(admin.id)).await?;
    Ok(Json(row))
}

// ---------------------------------------------------------------------------
// PATCH /api/v1/admin/settings
// ---------------------------------------------------------------------------

#[utoipa::path(
    patch,
    path = "/api/v1/admin/settings",
    responses(
        (status = 200, description = "Settings written", body = [SystemSetting]),
        (status = 400, description = "Unknown setting key")
    ),
    tag = "admin"
)]
pub async fn patch_settings(
    State(state): State<AppState>,
    AdminRequired(admin): AdminRequired,
    Json(body): Json<serde_json::Map<String, serde_json::Value>>,
) -> Result<Json<Vec<SystemSetting>>, AppError> {
    let written = state.settings.set_many(body, Some(admin.id)).await?;
    Ok(Json(written))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/admin/settings/{key}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/admin/settings/{key}",
    params(("key" = String, Path, description = "Setting key")),
    responses(
        (status = 200, description = "Override removed; reads return the default"),
        (status = 400, description = "Unknown setting key")
    ),
    tag = "admin"
)]
pub async fn delete_setting(
    State(state): State<AppState>,
    AdminRequired(_admin): AdminRequired,
    Path(key): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.settings.delete(&key).await?;
    Ok(Json(json!({ "ok": true })))
}
