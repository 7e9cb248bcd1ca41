//! Public authentication routes: provider listing, the OIDC redirect
//! flow, credential login, session management, and identity linking.

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Redirect;
use axum::Json;
use shared_types::{
    AppError, AuthConfigResponse, AuthMode, AuthProvider, AuthorizeParams, AuthorizeResponse,
    CallbackParams, LinkIdentityRequest, LoginRequest, LoginResponse, ProviderKind,
    ProviderPublic, SessionInfo, UserIdentity, UserInfo,
};
use uuid::Uuid;

use crate::auth::extractors::AuthRequired;
use crate::auth::provider::Credentials;
use crate::cache::keys;
use crate::db::AppState;
use crate::repo;

const PROVIDERS_CACHE_TTL_SECS: u64 = 300;

fn to_public(provider: &AuthProvider) -> ProviderPublic {
    ProviderPublic {
        id: provider.id,
        kind: provider.kind.clone(),
        name: provider.name.clone(),
        slug: provider.slug.clone(),
        icon: provider.icon.clone(),
        is_default: provider.is_default,
        display_order: provider.display_order,
        supports_redirect: provider.kind() == Some(ProviderKind::Oidc),
    }
}

async fn enabled_provider(state: &AppState, slug: &str) -> Result<AuthProvider, AppError> {
    repo::providers::find_by_slug(&state.pool, slug)
        .await?
        .filter(|p| p.enabled)
        .ok_or_else(|| AppError::bad_request("Unknown or disabled provider"))
}

// ---------------------------------------------------------------------------
// GET /api/v1/auth/providers
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/auth/providers",
    responses(
        (status = 200, description = "Enabled providers", body = [ProviderPublic])
    ),
    tag = "auth"
)]
pub async fn list_providers(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProviderPublic>>, AppError> {
    let cache_key = keys::auth_providers();
    if let Some(cached) = state.cache.get_json::<Vec<ProviderPublic>>(&cache_key).await {
        return Ok(Json(cached));
    }

    let providers = repo::providers::list_enabled(&state.pool).await?;
    let public: Vec<ProviderPublic> = providers.iter().map(to_public).collect();
    state
        .cache
        .set_json(&cache_key, &public, PROVIDERS_CACHE_TTL_SECS)
        .await;
    Ok(Json(public))
}

// ---------------------------------------------------------------------------
// GET /api/v1/auth/providers/{slug}/authorize
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/auth/providers/{slug}/authorize",
    params(
        ("slug" = String, Path, description = "Provider slug"),
        AuthorizeParams
    ),
    responses(
        (status = 200, description = "Authorization URL", body = AuthorizeResponse),
        (status = 400, description = "Provider does not support redirect")
    ),
    tag = "auth"
)]
pub async fn authorize(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Json<AuthorizeResponse>, AppError> {
    let record = enabled_provider(&state, &slug).await?;
    let provider = crate::auth::build_provider(&state, &record)?;
    if !provider.supports_redirect() {
        return Err(AppError::bad_request("Provider does not support redirect"));
    }
    let response = provider.get_authorization_url(&params.redirect_uri).await?;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// GET /api/v1/auth/providers/{slug}/callback
// ---------------------------------------------------------------------------

fn error_redirect(message: &str) -> Redirect {
    let frontend = crate::config::frontend_url();
    Redirect::to(&format!(
        "{frontend}/login?error={}",
        urlencoding::encode(message)
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/providers/{slug}/callback",
    params(
        ("slug" = String, Path, description = "Provider slug"),
        CallbackParams
    ),
    responses(
        (status = 302, description = "Redirect to the front-end with a session token or an error")
    ),
    tag = "auth"
)]
pub async fn callback(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    if let Some(error) = &params.error {
        return error_redirect(error);
    }
    let (Some(code), Some(callback_state)) = (&params.code, &params.state) else {
        return error_redirect("Missing code or state parameter");
    };

    let record = match enabled_provider(&state, &slug).await {
        Ok(record) => record,
        Err(e) => return error_redirect(&e.message),
    };
    let provider = match crate::auth::build_provider(&state, &record) {
        Ok(provider) => provider,
        Err(e) => return error_redirect(&e.message),
    };

    let result = provider.handle_callback(code, callback_state).await;
    if !result.success {
        let message = result
            .error
            .unwrap_or_else(|| "Authentication failed".to_string());
        return error_redirect(&message);
    }

    let (user, is_new_user) = match crate::auth::find_or_create_user(&state, &record, &result).await
    {
        Ok(outcome) => outcome,
        Err(e) => return error_redirect(&e.message),
    };

    let session = match repo::sessions::create(&state.pool, user.id).await {
        Ok(session) => session,
        Err(e) => return error_redirect(&e.message),
    };

    let frontend = crate::config::frontend_url();
    Redirect::to(&format!(
        "{frontend}/auth/callback?token={}&expires={}&new_user={}",
        session.token,
        urlencoding::encode(&session.expires_at.to_rfc3339()),
        is_new_user
    ))
}

// ---------------------------------------------------------------------------
// POST /api/v1/auth/providers/{slug}/login
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/auth/providers/{slug}/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = LoginResponse),
        (status = 401, description = "Invalid credentials")
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let record = enabled_provider(&state, &slug).await?;
    let provider = crate::auth::build_provider(&state, &record)?;
    if provider.supports_redirect() {
        return Err(AppError::bad_request(
            "This provider authenticates through the redirect flow",
        ));
    }

    let credentials = Credentials {
        username: body.username,
        password: body.password,
    };
    let result = provider.authenticate(&credentials).await;
    if !result.success {
        let message = result
            .error
            .unwrap_or_else(|| "Authentication failed".to_string());
        return Err(AppError::unauthorized(message));
    }

    let (user, is_new_user) = crate::auth::find_or_create_user(&state, &record, &result).await?;
    let session = repo::sessions::create(&state.pool, user.id).await?;

    Ok(Json(LoginResponse {
        user: UserInfo::from(&user),
        session: SessionInfo {
            token: session.token,
            expires_at: session.expires_at,
        },
        is_new_user,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/auth/config
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/auth/config",
    responses(
        (status = 200, description = "Public auth configuration", body = AuthConfigResponse)
    ),
    tag = "auth"
)]
pub async fn auth_config(State(state): State<AppState>) -> Json<AuthConfigResponse> {
    let mode = state.settings.auth_mode().await;
    let signup_enabled = state.settings.signup_enabled().await;
    Json(AuthConfigResponse {
        auth_mode: mode.as_str().to_string(),
        signup_enabled,
        requires_login: mode == AuthMode::Standard,
    })
}

// ---------------------------------------------------------------------------
// GET /api/v1/auth/me, POST /api/v1/auth/logout
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = UserInfo),
        (status = 401, description = "Not authenticated")
    ),
    tag = "auth"
)]
pub async fn me(AuthRequired(user): AuthRequired) -> Json<UserInfo> {
    Json(UserInfo::from(&user))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Session revoked")
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    AuthRequired(_user): AuthRequired,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(token) = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "))
    {
        repo::sessions::delete_by_token(&state.pool, token.trim()).await?;
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ---------------------------------------------------------------------------
// Identities: list, link, unlink
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/auth/identities",
    responses(
        (status = 200, description = "Linked identities", body = [UserIdentity])
    ),
    tag = "auth"
)]
pub async fn list_identities(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
) -> Result<Json<Vec<UserIdentity>>, AppError> {
    let identities = repo::identities::list_for_user(&state.pool, user.id).await?;
    Ok(Json(identities))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/identities/link",
    request_body = LinkIdentityRequest,
    responses(
        (status = 200, description = "Identity linked", body = UserIdentity),
        (status = 400, description = "Identity belongs to another account")
    ),
    tag = "auth"
)]
pub async fn link_identity(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Json(body): Json<LinkIdentityRequest>,
) -> Result<Json<UserIdentity>, AppError> {
    let credentials = Credentials {
        username: body.username.unwrap_or_default(),
        password: body.password.unwrap_or_default(),
    };
    let identity =
        crate::auth::link_identity(&state, &user, &body.provider_slug, &credentials).await?;
    Ok(Json(identity))
}

#[utoipa::path(
    delete,
    path = "/api/v1/auth/identities/{id}",
    params(
        ("id" = Uuid, Path, description = "Identity id")
    ),
    responses(
        (status = 200, description = "Identity unlinked"),
        (status = 400, description = "Cannot unlink the only authentication method")
    ),
    tag = "auth"
)]
pub async fn unlink_identity(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    crate::auth::unlink_identity(&state, &user, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
