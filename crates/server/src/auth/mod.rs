//! Authentication and identity: pluggable providers, user provisioning,
//! identity linking, and sessions.

pub mod extractors;
pub mod ldap;
pub mod local;
pub mod middleware;
pub mod oidc;
pub mod password;
pub mod provider;

use shared_types::{normalize_email, AppError, AuthProvider, ProviderKind, User, UserIdentity};

use crate::db::AppState;
use crate::repo;
use provider::{AuthenticationResult, Credentials, Provider};

/// Construct the provider implementation for a stored provider row. The
/// opaque config column parses into the kind-specific struct; unknown
/// keys are rejected.
pub fn build_provider(
    state: &AppState,
    record: &AuthProvider,
) -> Result<Box<dyn Provider>, AppError> {
    match record.kind() {
        Some(ProviderKind::Local) => Ok(Box::new(local::LocalProvider::new(state.pool.clone()))),
        Some(ProviderKind::Oidc) => {
            let config: provider::OidcConfig = serde_json::from_value(record.config.clone())
                .map_err(|e| {
                    AppError::bad_request(format!("Invalid OIDC provider configuration: {e}"))
                })?;
            Ok(Box::new(oidc::OidcProvider::new(
                record.clone(),
                config,
                state.pool.clone(),
                state.cache.clone(),
                state.http.clone(),
            )))
        }
        Some(ProviderKind::Ldap) => {
            let config: provider::LdapConfig = serde_json::from_value(record.config.clone())
                .map_err(|e| {
                    AppError::bad_request(format!("Invalid LDAP provider configuration: {e}"))
                })?;
            Ok(Box::new(ldap::LdapProvider::new(config)))
        }
        None => Err(AppError::bad_request(format!(
            "Unknown provider kind: {}",
            record.kind
        ))),
    }
}

/// Resolve a successful provider authentication to a platform user.
///
/// Order matters: an existing identity wins, then an email match links a
/// new identity to the existing account, then auto-registration applies
/// its gates. Disabled users are always rejected.
pub async fn find_or_create_user(
    state: &AppState,
    provider_record: &AuthProvider,
    auth: &AuthenticationResult,
) -> Result<(User, bool), AppError> {
    let provider_user_id = auth
        .provider_user_id
        .as_deref()
        .ok_or_else(|| AppError::internal("Provider returned no user identifier"))?;

    // 1. Known identity.
    if let Some(identity) =
        repo::identities::find(&state.pool, provider_record.id, provider_user_id).await?
    {
        let user = repo::users::find_by_id(&state.pool, identity.user_id)
            .await?
            .ok_or_else(|| AppError::internal("Identity references a missing user"))?;
        if user.disabled {
            return Err(AppError::forbidden("This account has been disabled"));
        }
        repo::users::touch_last_login(&state.pool, user.id).await?;
        return Ok((user, false));
    }

    let email = auth
        .email
        .as_deref()
        .map(normalize_email)
        .ok_or_else(|| AppError::bad_request("Identity provider did not supply an email"))?;

    // 2. Existing account with the same email: link.
    if let Some(user) = repo::users::find_by_email(&state.pool, &email).await? {
        if user.disabled {
            return Err(AppError::forbidden("This account has been disabled"));
        }
        repo::identities::create(&state.pool, user.id, provider_record.id, provider_user_id)
            .await?;
        repo::users::touch_last_login(&state.pool, user.id).await?;
        return Ok((user, false));
    }

    // 3. New account, gated twice.
    if !provider_record.allow_auto_register {
        return Err(AppError::forbidden(
            "Automatic registration is disabled for this provider",
        ));
    }
    if !state.settings.signup_enabled().await {
        return Err(AppError::forbidden("Signups are disabled"));
    }

    let display_name = auth
        .name
        .clone()
        .unwrap_or_else(|| email.split('@').next().unwrap_or("user").to_string());
    let user = repo::users::create(&state.pool, &email, &display_name, None, false).await?;
    repo::identities::create(&state.pool, user.id, provider_record.id, provider_user_id).await?;
    repo::users::touch_last_login(&state.pool, user.id).await?;
    Ok((user, true))
}

/// Attach a new identity to an existing user after authenticating against
/// the named provider with the supplied credentials.
pub async fn link_identity(
    state: &AppState,
    user: &User,
    provider_slug: &str,
    credentials: &Credentials,
) -> Result<UserIdentity, AppError> {
    let record = repo::providers::find_by_slug(&state.pool, provider_slug)
        .await?
        .filter(|p| p.enabled)
        .ok_or_else(|| AppError::bad_request("Unknown or disabled provider"))?;

    let provider = build_provider(state, &record)?;
    let result = provider.authenticate(credentials).await;
    if !result.success {
        return Err(AppError::unauthorized(
            result.error.unwrap_or_else(|| "Authentication failed".to_string()),
        ));
    }
    let provider_user_id = result
        .provider_user_id
        .ok_or_else(|| AppError::internal("Provider returned no user identifier"))?;

    if let Some(existing) = repo::identities::find(&state.pool, record.id, &provider_user_id).await? {
        if existing.user_id != user.id {
            return Err(AppError::bad_request(
                "This identity is already linked to another account",
            ));
        }
        return Ok(existing);
    }

    repo::identities::create(&state.pool, user.id, record.id, &provider_user_id).await
}

/// Detach an identity. A user always keeps at least one; unlinking the
/// local identity also clears the password hash.
pub async fn unlink_identity(
    state: &AppState,
    user: &User,
    identity_id: uuid::Uuid,
) -> Result<(), AppError> {
    let identity = repo::identities::find_by_id(&state.pool, identity_id)
        .await?
        .filter(|i| i.user_id == user.id)
        .ok_or_else(|| AppError::not_found("Identity not found"))?;

    if repo::identities::count_for_user(&state.pool, user.id).await? <= 1 {
        return Err(AppError::bad_request(
            "Cannot unlink the only authentication method",
        ));
    }

    let provider = repo::providers::find_by_id(&state.pool, identity.provider_id).await?;
    repo::identities::delete(&state.pool, identity.id).await?;

    if provider.and_then(|p| p.kind()) == Some(ProviderKind::Local) {
        repo::users::clear_password_hash(&state.pool, user.id).await?;
    }
    Ok(())
}
