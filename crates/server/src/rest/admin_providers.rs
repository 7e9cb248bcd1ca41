//! Admin CRUD for authentication providers. Sensitive config fields are
//! masked in every response; the local provider cannot be deleted or
//! disabled.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use shared_types::{
    is_valid_provider_slug, AppError, AuthProvider, CreateProviderRequest, ProviderKind,
    ReorderProvidersRequest, TestProviderResponse, UpdateProviderRequest,
};
use uuid::Uuid;

use crate::auth::extractors::AdminRequired;
use crate::auth::provider::{mask_config, merge_config_update, LdapConfig, OidcConfig};
use crate::cache::keys;
use crate::db::AppState;
use crate::repo;

fn masked(mut provider: AuthProvider) -> AuthProvider {
    provider.config = mask_config(&provider.config);
    provider
}

async fn invalidate_provider_cache(state: &AppState) {
    state.cache.delete(&keys::auth_providers()).await;
}

/// Parse and validate a kind-specific config.
fn validate_config(kind: ProviderKind, config: &serde_json::Value) -> Result<(), AppError> {
    match kind {
        ProviderKind::Local => Ok(()),
        ProviderKind::Oidc => {
            let parsed: OidcConfig = serde_json::from_value(config.clone()).map_err(|e| {
                AppError::bad_request(format!("Invalid OIDC provider configuration: {e}"))
            })?;
            parsed.validate()
        }
        ProviderKind::Ldap => {
            let parsed: LdapConfig = serde_json::from_value(config.clone()).map_err(|e| {
                AppError::bad_request(format!("Invalid LDAP provider configuration: {e}"))
            })?;
            parsed.validate()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /api/v1/admin/auth/providers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/admin/auth/providers",
    responses(
        (status = 200, description = "All providers (config masked)", body = [AuthProvider])
    ),
    tag = "admin"
)]
pub async fn list_providers(
    State(state): State<AppState>,
    AdminRequired(_admin): AdminRequired,
) -> Result<Json<Vec<AuthProvider>>, AppError> {
    let providers = repo::providers::list(&state.pool).await?;
    Ok(Json(providers.into_iter().map(masked).collect()))
}

// ---------------------------------------------------------------------------
// GET /api/v1/admin/auth/providers/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/admin/auth/providers/{id}",
    params(("id" = Uuid, Path, description = "Provider id")),
    responses(
        (status = 200, description = "Provider (config masked)", body = AuthProvider),
        (status = 404, description = "Not found")
    ),
    tag = "admin"
)]
pub async fn get_provider(
    State(state): State<AppState>,
    AdminRequired(_admin): AdminRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<AuthProvider>, AppError> {
    let provider = repo::providers::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Provider not found"))?;
    Ok(Json(masked(provider)))
}

// ---------------------------------------------------------------------------
// POST /api/v1/admin/auth/providers
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/admin/auth/providers",
    request_body = CreateProviderRequest,
    responses(
        (status = 201, description = "Provider created", body = AuthProvider),
        (status = 400, description = "Invalid configuration")
    ),
    tag = "admin"
)]
pub async fn create_provider(
    State(state): State<AppState>,
    AdminRequired(_admin): AdminRequired,
    Json(body): Json<CreateProviderRequest>,
) -> Result<(StatusCode, Json<AuthProvider>), AppError> {
    let kind = ProviderKind::parse(&body.kind)
        .ok_or_else(|| AppError::bad_request(format!("Unknown provider kind: {}", body.kind)))?;
    if kind == ProviderKind::Local {
        return Err(AppError::bad_request("The local provider is built in"));
    }
    if !is_valid_provider_slug(&body.slug) {
        return Err(AppError::bad_request(
            "Slug must be 2-50 characters of lowercase letters, digits, and hyphens",
        ));
    }
    if body.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }

    let config = body.config.unwrap_or_else(|| serde_json::json!({}));
    validate_config(kind, &config)?;

    let provider = repo::providers::create(
        &state.pool,
        kind.as_str(),
        &body.slug,
        &body.name,
        body.icon.as_deref(),
        body.enabled.unwrap_or(true),
        body.is_default.unwrap_or(false),
        body.display_order.unwrap_or(0),
        body.allow_auto_register.unwrap_or(true),
        &config,
    )
    .await?;

    if provider.is_default {
        repo::providers::clear_default_except(&state.pool, provider.id).await?;
    }
    invalidate_provider_cache(&state).await;

    Ok((StatusCode::CREATED, Json(masked(provider))))
}

// ---------------------------------------------------------------------------
// PUT /api/v1/admin/auth/providers/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/api/v1/admin/auth/providers/{id}",
    params(("id" = Uuid, Path, description = "Provider id")),
    request_body = UpdateProviderRequest,
    responses(
        (status = 200, description = "Provider updated", body = AuthProvider),
        (status = 400, description = "Invalid update"),
        (status = 404, description = "Not found")
    ),
    tag = "admin"
)]
pub async fn update_provider(
    State(state): State<AppState>,
    AdminRequired(_admin): AdminRequired,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateProviderRequest>,
) -> Result<Json<AuthProvider>, AppError> {
    let existing = repo::providers::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Provider not found"))?;
    let kind = existing
        .kind()
        .ok_or_else(|| AppError::internal("Stored provider has an unknown kind"))?;

    let enabled = body.enabled.unwrap_or(existing.enabled);
    if kind == ProviderKind::Local && !enabled {
        return Err(AppError::bad_request("Cannot disable the local provider"));
    }

    let config = match body.config {
        Some(update) => {
            let merged = merge_config_update(&existing.config, update);
            validate_config(kind, &merged)?;
            merged
        }
        None => existing.config.clone(),
    };

    let updated = repo::providers::update(
        &state.pool,
        id,
        body.name.as_deref().unwrap_or(&existing.name),
        body.icon.as_deref().or(existing.icon.as_deref()),
        enabled,
        body.is_default.unwrap_or(existing.is_default),
        body.display_order.unwrap_or(existing.display_order),
        body.allow_auto_register.unwrap_or(existing.allow_auto_register),
        &config,
    )
    .await?
    .ok_or_else(|| AppError::not_found("Provider not found"))?;

    if updated.is_default {
        repo::providers::clear_default_except(&state.pool, updated.id).await?;
    }
    invalidate_provider_cache(&state).await;

    Ok(Json(masked(updated)))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/admin/auth/providers/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/admin/auth/providers/{id}",
    params(("id" = Uuid, Path, description = "Provider id")),
    responses(
        (status = 200, description = "Provider deleted"),
        (status = 400, description = "Provider cannot be deleted"),
        (status = 404, description = "Not found")
    ),
    tag = "admin"
)]
pub async fn delete_provider(
    State(state): State<AppState>,
    AdminRequired(_admin): AdminRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let provider = repo::providers::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Provider not found"))?;

    if provider.kind() == Some(ProviderKind::Local) {
        return Err(AppError::bad_request("Cannot delete the local provider"));
    }
    let linked = repo::identities::count_for_provider(&state.pool, id).await?;
    if linked > 0 {
        return Err(AppError::bad_request(format!(
            "Cannot delete a provider with {linked} linked users"
        )));
    }

    repo::providers::delete(&state.pool, id).await?;
    invalidate_provider_cache(&state).await;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ---------------------------------------------------------------------------
// PUT /api/v1/admin/auth/providers/reorder
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/api/v1/admin/auth/providers/reorder",
    request_body = ReorderProvidersRequest,
    responses(
        (status = 200, description = "Display order applied")
    ),
    tag = "admin"
)]
pub async fn reorder_providers(
    State(state): State<AppState>,
    AdminRequired(_admin): AdminRequired,
    Json(body): Json<ReorderProvidersRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    repo::providers::reorder(&state.pool, &body.ids).await?;
    invalidate_provider_cache(&state).await;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ---------------------------------------------------------------------------
// POST /api/v1/admin/auth/providers/{id}/test
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/admin/auth/providers/{id}/test",
    params(("id" = Uuid, Path, description = "Provider id")),
    responses(
        (status = 200, description = "Connection test outcome", body = TestProviderResponse)
    ),
    tag = "admin"
)]
pub async fn test_provider(
    State(state): State<AppState>,
    AdminRequired(_admin): AdminRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<TestProviderResponse>, AppError> {
    let record = repo::providers::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Provider not found"))?;
    let provider = crate::auth::build_provider(&state, &record)?;
    provider.validate_config()?;
    Ok(Json(provider.test_connection().await))
}
