use axum::http::StatusCode;
use serde_json::json;

use crate::common::*;
use crate::require_db;

fn oidc_body() -> serde_json::Value {
    json!({
        "kind": "oidc",
        "slug": "okta",
        "name": "Okta",
        "config": {
            "issuerUrl": "https://id.example.com",
            "clientId": "abc",
            "clientSecret": "super-secret"
        }
    })
}

#[tokio::test]
async fn create_provider_masks_secrets_in_response() {
    let ctx = require_db!();
    let token = Some(ctx.seed.admin_token.as_str());

    let (status, resp) = post_json(
        &ctx.app,
        "/api/v1/admin/auth/providers",
        &oidc_body(),
        token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(resp["config"]["clientSecret"], "••••••••");
    assert_eq!(resp["config"]["clientId"], "abc");

    // The stored secret is intact.
    let stored = server::repo::providers::find_by_slug(&ctx.pool, "okta")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.config["clientSecret"], "super-secret");
}

#[tokio::test]
async fn create_provider_rejects_bad_slug_and_kind() {
    let ctx = require_db!();
    let token = Some(ctx.seed.admin_token.as_str());

    let mut bad_slug = oidc_body();
    bad_slug["slug"] = json!("Bad_Slug");
    let (status, _) = post_json(&ctx.app, "/api/v1/admin/auth/providers", &bad_slug, token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut bad_kind = oidc_body();
    bad_kind["kind"] = json!("saml");
    let (status, _) = post_json(&ctx.app, "/api/v1/admin/auth/providers", &bad_kind, token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_provider_rejects_unknown_config_keys() {
    let ctx = require_db!();

    let mut body = oidc_body();
    body["config"]["surprise"] = json!(true);
    let (status, _) = post_json(
        &ctx.app,
        "/api/v1/admin/auth/providers",
        &body,
        Some(ctx.seed.admin_token.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_provider_rejects_insecure_issuer() {
    let ctx = require_db!();

    let mut body = oidc_body();
    body["config"]["issuerUrl"] = json!("http://id.example.com");
    let (status, _) = post_json(
        &ctx.app,
        "/api/v1/admin/auth/providers",
        &body,
        Some(ctx.seed.admin_token.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Localhost http is the development allowance.
    body["config"]["issuerUrl"] = json!("http://localhost:8080/realms/dev");
    let (status, _) = post_json(
        &ctx.app,
        "/api/v1/admin/auth/providers",
        &body,
        Some(ctx.seed.admin_token.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn masked_secret_in_update_preserves_stored_value() {
    let ctx = require_db!();
    let token = Some(ctx.seed.admin_token.as_str());

    let (_, created) = post_json(&ctx.app, "/api/v1/admin/auth/providers", &oidc_body(), token).await;
    let id = created["id"].as_str().unwrap();

    let (status, _) = request(
        &ctx.app,
        "PUT",
        &format!("/api/v1/admin/auth/providers/{id}"),
        Some(&json!({
            "name": "Okta Renamed",
            "config": {
                "issuerUrl": "https://id.example.com",
                "clientId": "abc",
                "clientSecret": "••••••••"
            }
        })),
        token,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let stored = server::repo::providers::find_by_slug(&ctx.pool, "okta")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.name, "Okta Renamed");
    assert_eq!(stored.config["clientSecret"], "super-secret");
}

#[tokio::test]
async fn local_provider_cannot_be_deleted_or_disabled() {
    let ctx = require_db!();
    let token = Some(ctx.seed.admin_token.as_str());

    let local = server::repo::providers::find_by_slug(&ctx.pool, "local")
        .await
        .unwrap()
        .unwrap();

    let (status, resp) = request(
        &ctx.app,
        "DELETE",
        &format!("/api/v1/admin/auth/providers/{}", local.id),
        None,
        token,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["message"], "Cannot delete the local provider");

    let (status, resp) = request(
        &ctx.app,
        "PUT",
        &format!("/api/v1/admin/auth/providers/{}", local.id),
        Some(&json!({"enabled": false})),
        token,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["message"], "Cannot disable the local provider");
}

#[tokio::test]
async fn provider_with_linked_users_cannot_be_deleted() {
    let ctx = require_db!();
    let token = Some(ctx.seed.admin_token.as_str());

    let (_, created) = post_json(&ctx.app, "/api/v1/admin/auth/providers", &oidc_body(), token).await;
    let id: uuid::Uuid = created["id"].as_str().unwrap().parse().unwrap();
    server::repo::identities::create(&ctx.pool, ctx.seed.admin.id, id, "sub-x")
        .await
        .unwrap();

    let (status, resp) = request(
        &ctx.app,
        "DELETE",
        &format!("/api/v1/admin/auth/providers/{id}"),
        None,
        token,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(resp["message"]
        .as_str()
        .unwrap()
        .contains("linked users"));
}

#[tokio::test]
async fn reorder_applies_display_order() {
    let ctx = require_db!();
    let token = Some(ctx.seed.admin_token.as_str());

    let (_, created) = post_json(&ctx.app, "/api/v1/admin/auth/providers", &oidc_body(), token).await;
    let okta_id = created["id"].as_str().unwrap().to_string();
    let local = server::repo::providers::find_by_slug(&ctx.pool, "local")
        .await
        .unwrap()
        .unwrap();

    let (status, _) = request(
        &ctx.app,
        "PUT",
        "/api/v1/admin/auth/providers/reorder",
        Some(&json!({"ids": [okta_id, local.id.to_string()]})),
        token,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let providers = server::repo::providers::list(&ctx.pool).await.unwrap();
    assert_eq!(providers[0].slug, "okta");
    assert_eq!(providers[0].display_order, 0);
    assert_eq!(providers[1].slug, "local");
    assert_eq!(providers[1].display_order, 1);
}

#[tokio::test]
async fn admin_routes_reject_non_admins() {
    let ctx = require_db!();

    let user = server::repo::users::create(&ctx.pool, "member@example.com", "Member", None, false)
        .await
        .unwrap();
    let session = server::repo::sessions::create(&ctx.pool, user.id).await.unwrap();

    let (status, _) = get(
        &ctx.app,
        "/api/v1/admin/auth/providers",
        Some(session.token.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
