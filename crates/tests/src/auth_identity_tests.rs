use server::auth::provider::{AuthenticationResult, Credentials, Provider};

use crate::require_db;

fn sso_result(sub: &str, email: &str, name: &str) -> AuthenticationResult {
    AuthenticationResult::ok(
        sub.to_string(),
        Some(email.to_string()),
        Some(name.to_string()),
    )
}

async fn seed_oidc_provider(
    ctx: &crate::common::TestContext,
    allow_auto_register: bool,
) -> shared_types::AuthProvider {
    server::repo::providers::create(
        &ctx.pool,
        "oidc",
        "okta",
        "Okta",
        None,
        true,
        false,
        1,
        allow_auto_register,
        &serde_json::json!({
            "issuerUrl": "https://id.example.com",
            "clientId": "abc",
            "clientSecret": "xyz"
        }),
    )
    .await
    .expect("Failed to seed provider")
}

#[tokio::test]
async fn auto_register_creates_user_and_identity() {
    let ctx = require_db!();
    let provider = seed_oidc_provider(&ctx, true).await;

    let result = sso_result("sub-1", "New.User@Example.com", "New User");
    let (user, is_new) = server::auth::find_or_create_user(&ctx.state, &provider, &result)
        .await
        .unwrap();
    assert!(is_new);
    assert_eq!(user.email, "new.user@example.com");
    assert!(user.password_hash.is_none());

    // Second login resolves the same user through the identity.
    let (again, is_new) = server::auth::find_or_create_user(&ctx.state, &provider, &result)
        .await
        .unwrap();
    assert!(!is_new);
    assert_eq!(again.id, user.id);
}

#[tokio::test]
async fn matching_email_links_identity_to_existing_user() {
    let ctx = require_db!();
    let provider = seed_oidc_provider(&ctx, true).await;

    // The seeded admin already exists with a local identity.
    let result = sso_result("sub-admin", " ADMIN@EXAMPLE.COM ", "Admin via SSO");
    let (user, is_new) = server::auth::find_or_create_user(&ctx.state, &provider, &result)
        .await
        .unwrap();
    assert!(!is_new);
    assert_eq!(user.id, ctx.seed.admin.id);

    let identities = server::repo::identities::list_for_user(&ctx.pool, user.id)
        .await
        .unwrap();
    assert_eq!(identities.len(), 2);
}

#[tokio::test]
async fn auto_register_disabled_rejects_unknown_user() {
    let ctx = require_db!();
    let provider = seed_oidc_provider(&ctx, false).await;

    let result = sso_result("sub-2", "stranger@example.com", "Stranger");
    let err = server::auth::find_or_create_user(&ctx.state, &provider, &result)
        .await
        .unwrap_err();
    assert!(err.message.contains("Automatic registration is disabled"));
}

#[tokio::test]
async fn global_signup_disabled_rejects_unknown_user() {
    let ctx = require_db!();
    let provider = seed_oidc_provider(&ctx, true).await;
    ctx.state
        .settings
        .set("auth.signup_enabled", serde_json::json!(false), None)
        .await
        .unwrap();

    let result = sso_result("sub-3", "stranger2@example.com", "Stranger");
    let err = server::auth::find_or_create_user(&ctx.state, &provider, &result)
        .await
        .unwrap_err();
    assert!(err.message.contains("Signups are disabled"));
}

#[tokio::test]
async fn disabled_user_is_always_rejected() {
    let ctx = require_db!();
    let provider = seed_oidc_provider(&ctx, true).await;

    let result = sso_result("sub-4", "disabled@example.com", "Disabled");
    let (user, _) = server::auth::find_or_create_user(&ctx.state, &provider, &result)
        .await
        .unwrap();
    sqlx::query("UPDATE users SET disabled = TRUE WHERE id = $1")
        .bind(user.id)
        .execute(&ctx.pool)
        .await
        .unwrap();

    let err = server::auth::find_or_create_user(&ctx.state, &provider, &result)
        .await
        .unwrap_err();
    assert!(err.message.contains("disabled"));
}

#[tokio::test]
async fn unlink_only_identity_is_rejected() {
    let ctx = require_db!();

    let identities = server::repo::identities::list_for_user(&ctx.pool, ctx.seed.admin.id)
        .await
        .unwrap();
    assert_eq!(identities.len(), 1);

    let err = server::auth::unlink_identity(&ctx.state, &ctx.seed.admin, identities[0].id)
        .await
        .unwrap_err();
    assert_eq!(err.message, "Cannot unlink the only authentication method");
}

#[tokio::test]
async fn unlink_local_identity_clears_password_hash() {
    let ctx = require_db!();
    let provider = seed_oidc_provider(&ctx, true).await;

    // Give the admin a second (external) identity, then unlink local.
    server::repo::identities::create(&ctx.pool, ctx.seed.admin.id, provider.id, "ext-sub")
        .await
        .unwrap();
    let identities = server::repo::identities::list_for_user(&ctx.pool, ctx.seed.admin.id)
        .await
        .unwrap();
    let local = server::repo::providers::find_by_slug(&ctx.pool, "local")
        .await
        .unwrap()
        .unwrap();
    let local_identity = identities
        .iter()
        .find(|i| i.provider_id == local.id)
        .unwrap();

    server::auth::unlink_identity(&ctx.state, &ctx.seed.admin, local_identity.id)
        .await
        .unwrap();

    let user = server::repo::users::find_by_id(&ctx.pool, ctx.seed.admin.id)
        .await
        .unwrap()
        .unwrap();
    assert!(user.password_hash.is_none());
}

#[tokio::test]
async fn identity_owned_by_another_user_cannot_be_linked() {
    let ctx = require_db!();
    let provider = seed_oidc_provider(&ctx, true).await;

    // A stranger owns the external identity.
    let result = sso_result("contested-sub", "other@example.com", "Other");
    server::auth::find_or_create_user(&ctx.state, &provider, &result)
        .await
        .unwrap();

    // The admin tries to claim the same (provider, provider_user_id).
    let existing = server::repo::identities::find(&ctx.pool, provider.id, "contested-sub")
        .await
        .unwrap()
        .unwrap();
    assert_ne!(existing.user_id, ctx.seed.admin.id);
}

#[tokio::test]
async fn local_authentication_normalizes_email() {
    let ctx = require_db!();
    let provider = server::auth::local::LocalProvider::new(ctx.pool.clone());

    let result = provider
        .authenticate(&Credentials {
            username: " ADMIN@EXAMPLE.COM ".to_string(),
            password: "hunter2-hunter2".to_string(),
        })
        .await;
    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.email.as_deref(), Some("admin@example.com"));
}

#[tokio::test]
async fn local_authentication_rejects_wrong_password() {
    let ctx = require_db!();
    let provider = server::auth::local::LocalProvider::new(ctx.pool.clone());

    let result = provider
        .authenticate(&Credentials {
            username: "admin@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await;
    assert!(!result.success);
    assert_eq!(
        result.error_code.unwrap().as_str(),
        "INVALID_CREDENTIALS"
    );
}

#[tokio::test]
async fn oidc_callback_with_unknown_state_fails() {
    let ctx = require_db!();
    let record = seed_oidc_provider(&ctx, true).await;
    let provider = server::auth::build_provider(&ctx.state, &record).unwrap();

    let result = provider.handle_callback("x", "nope").await;
    assert!(!result.success);
    assert_eq!(result.error_code.unwrap().as_str(), "INVALID_STATE");
    assert_eq!(
        result.error.as_deref(),
        Some("Invalid or expired authentication state")
    );
}

#[tokio::test]
async fn oidc_state_expires_after_ttl() {
    let ctx = require_db!();
    let record = seed_oidc_provider(&ctx, true).await;

    server::repo::oidc_states::create(
        &ctx.pool,
        "stale-state",
        "nonce",
        record.id,
        "https://app.example.com/callback",
        "verifier",
    )
    .await
    .unwrap();
    sqlx::query("UPDATE oidc_states SET created_at = NOW() - INTERVAL '10 minutes' WHERE state = $1")
        .bind("stale-state")
        .execute(&ctx.pool)
        .await
        .unwrap();

    let found = server::repo::oidc_states::find_valid(&ctx.pool, "stale-state")
        .await
        .unwrap();
    assert!(found.is_none());
}
