use axum::http::StatusCode;
use serde_json::json;

use crate::common::*;
use crate::require_db;

#[tokio::test]
async fn local_login_returns_session() {
    let ctx = require_db!();

    let (status, resp) = post_json(
        &ctx.app,
        "/api/v1/auth/providers/local/login",
        &json!({"username": "admin@example.com", "password": "hunter2-hunter2"}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["user"]["email"], "admin@example.com");
    assert_eq!(resp["isNewUser"], false);
    let token = resp["session"]["token"].as_str().unwrap();
    assert_eq!(token.len(), 64);

    // The fresh token authenticates.
    let (status, me) = get(&ctx.app, "/api/v1/auth/me", Some(token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "admin@example.com");
}

#[tokio::test]
async fn login_with_wrong_password_is_401() {
    let ctx = require_db!();

    let (status, _) = post_json(
        &ctx.app,
        "/api/v1/auth/providers/local/login",
        &json!({"username": "admin@example.com", "password": "nope"}),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_session() {
    let ctx = require_db!();

    let (status, _) = post_json(
        &ctx.app,
        "/api/v1/auth/logout",
        &json!({}),
        Some(ctx.seed.admin_token.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get(&ctx.app, "/api/v1/auth/me", Some(ctx.seed.admin_token.as_str())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn providers_listing_is_public() {
    let ctx = require_db!();

    let (status, resp) = get(&ctx.app, "/api/v1/auth/providers", None).await;
    assert_eq!(status, StatusCode::OK);
    let providers = resp.as_array().unwrap();
    assert!(providers.iter().any(|p| p["slug"] == "local"));
    for provider in providers {
        assert!(provider.get("config").is_none(), "config must not leak");
    }
}

#[tokio::test]
async fn auth_config_reflects_settings() {
    let ctx = require_db!();

    let (status, resp) = get(&ctx.app, "/api/v1/auth/config", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["authMode"], "standard");
    assert_eq!(resp["signupEnabled"], true);
    assert_eq!(resp["requiresLogin"], true);
}

#[tokio::test]
async fn auth_free_mode_serves_default_user() {
    let ctx = require_db!();

    ctx.state
        .settings
        .set("auth.mode", json!("none"), None)
        .await
        .unwrap();
    ctx.state
        .settings
        .set(
            "auth.default_user_id",
            json!(ctx.seed.admin.id.to_string()),
            None,
        )
        .await
        .unwrap();

    // No token needed on a protected path.
    let (status, me) = get(&ctx.app, "/api/v1/auth/me", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "admin@example.com");
}

#[tokio::test]
async fn auth_free_mode_without_default_user_is_503() {
    let ctx = require_db!();

    ctx.state
        .settings
        .set("auth.mode", json!("none"), None)
        .await
        .unwrap();

    let (status, _) = get(&ctx.app, "/api/v1/logs", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn admin_settings_crud_round_trip() {
    let ctx = require_db!();
    let token = Some(ctx.seed.admin_token.as_str());

    let (status, _) = request(
        &ctx.app,
        "PUT",
        "/api/v1/admin/settings/auth.signup_enabled",
        Some(&json!({"value": false})),
        token,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, resp) = get(
        &ctx.app,
        "/api/v1/admin/settings/auth.signup_enabled",
        token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["value"], false);

    // Delete restores the default.
    let (status, _) = request(
        &ctx.app,
        "DELETE",
        "/api/v1/admin/settings/auth.signup_enabled",
        None,
        token,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, resp) = get(
        &ctx.app,
        "/api/v1/admin/settings/auth.signup_enabled",
        token,
    )
    .await;
    assert_eq!(resp["value"], true);
}

#[tokio::test]
async fn unknown_setting_key_is_rejected() {
    let ctx = require_db!();

    let (status, _) = request(
        &ctx.app,
        "PUT",
        "/api/v1/admin/settings/auth.surprise",
        Some(&json!({"value": 1})),
        Some(ctx.seed.admin_token.as_str()),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_settings_require_admin_role() {
    let ctx = require_db!();

    let user = server::repo::users::create(&ctx.pool, "plain@example.com", "Plain", None, false)
        .await
        .unwrap();
    let session = server::repo::sessions::create(&ctx.pool, user.id).await.unwrap();

    let (status, _) = get(&ctx.app, "/api/v1/admin/settings", Some(session.token.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn patch_settings_validates_every_key_first() {
    let ctx = require_db!();

    let (status, _) = request(
        &ctx.app,
        "PATCH",
        "/api/v1/admin/settings",
        Some(&json!({"auth.signup_enabled": false, "auth.bogus": 1})),
        Some(ctx.seed.admin_token.as_str()),
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing was written.
    let (_, resp) = get(
        &ctx.app,
        "/api/v1/admin/settings/auth.signup_enabled",
        Some(ctx.seed.admin_token.as_str()),
    )
    .await;
    assert_eq!(resp["value"], true);
}
