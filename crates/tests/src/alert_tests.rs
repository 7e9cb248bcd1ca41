use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;
use shared_types::{AlertNotificationJob, CreateAlertRuleRequest, NewLog};

use crate::common::*;
use crate::require_db;

async fn seed_rule(ctx: &TestContext, threshold: i64) -> shared_types::AlertRule {
    server::repo::alert_rules::create(
        &ctx.pool,
        &CreateAlertRuleRequest {
            organization_id: ctx.seed.org.id,
            project_id: Some(ctx.seed.project.id),
            name: "High error rate".to_string(),
            service: None,
            levels: vec!["error".to_string(), "critical".to_string()],
            time_window_minutes: 5,
            threshold,
            enabled: Some(true),
            email_recipients: None,
            webhook_url: None,
        },
    )
    .await
    .expect("Failed to seed alert rule")
}

async fn seed_error_logs(ctx: &TestContext, count: usize) {
    let logs: Vec<NewLog> = (0..count)
        .map(|i| NewLog {
            time: Utc::now(),
            service: "api".to_string(),
            level: "error".to_string(),
            message: format!("err-{i}"),
            metadata: json!({}),
            trace_id: None,
            span_id: None,
        })
        .collect();
    server::repo::logs::insert_batch(&ctx.pool, ctx.seed.project.id, &logs)
        .await
        .unwrap();
}

#[tokio::test]
async fn evaluator_triggers_at_threshold_once_per_window() {
    let ctx = require_db!();
    let rule = seed_rule(&ctx, 3).await;

    // Below threshold: nothing happens.
    seed_error_logs(&ctx, 2).await;
    let fired = server::alerts::evaluator::evaluate_rule(&ctx.state, &rule)
        .await
        .unwrap();
    assert!(!fired);

    // Crossing the threshold fires and records history.
    seed_error_logs(&ctx, 2).await;
    let fired = server::alerts::evaluator::evaluate_rule(&ctx.state, &rule)
        .await
        .unwrap();
    assert!(fired);

    // A second pass inside the window is suppressed by the history row.
    let fired = server::alerts::evaluator::evaluate_rule(&ctx.state, &rule)
        .await
        .unwrap();
    assert!(!fired);

    let history: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM alert_history WHERE alert_rule_id = $1")
        .bind(rule.id)
        .fetch_one(&ctx.pool)
        .await
        .unwrap();
    assert_eq!(history, 1);
}

#[tokio::test]
async fn evaluator_respects_level_filter() {
    let ctx = require_db!();
    let rule = seed_rule(&ctx, 2).await;

    // Info logs never count toward an error-level rule.
    let logs: Vec<NewLog> = (0..5)
        .map(|i| NewLog {
            time: Utc::now(),
            service: "api".to_string(),
            level: "info".to_string(),
            message: format!("info-{i}"),
            metadata: json!({}),
            trace_id: None,
            span_id: None,
        })
        .collect();
    server::repo::logs::insert_batch(&ctx.pool, ctx.seed.project.id, &logs)
        .await
        .unwrap();

    let fired = server::alerts::evaluator::evaluate_rule(&ctx.state, &rule)
        .await
        .unwrap();
    assert!(!fired);
}

/// Stub webhook receiver answering 500 on every request.
async fn failing_webhook_server() -> (String, tokio::task::JoinHandle<()>) {
    let app = axum::Router::new().route(
        "/hook",
        axum::routing::post(|| async { axum::http::StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/hook"), handle)
}

#[tokio::test]
async fn failed_webhook_annotates_history_and_other_channels_proceed() {
    let ctx = require_db!();
    let rule = seed_rule(&ctx, 1).await;
    let history = server::repo::alert_history::create(&ctx.pool, rule.id, 7)
        .await
        .unwrap();

    let (webhook_url, server_handle) = failing_webhook_server().await;

    let job = AlertNotificationJob {
        history_id: history.id,
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        organization_id: ctx.seed.org.id,
        project_id: rule.project_id,
        log_count: 7,
        threshold: 1,
        time_window: 5,
        email_recipients: vec![],
        webhook_url: Some(webhook_url),
    };
    server::alerts::notifier::run(&ctx.state, &job).await.unwrap();
    server_handle.abort();

    let updated = server::repo::alert_history::find_by_id(&ctx.pool, history.id)
        .await
        .unwrap()
        .unwrap();
    assert!(updated.notified);
    assert_eq!(
        updated.error.as_deref(),
        Some("Webhook failed: Internal Server Error")
    );

    // The in-app channel still ran: every org member got a notification.
    let notifications =
        server::repo::notifications::list_for_user(&ctx.pool, ctx.seed.admin.id, 10)
            .await
            .unwrap();
    assert_eq!(notifications.len(), 1);
    assert!(notifications[0].title.contains("High error rate"));
}

#[tokio::test]
async fn successful_run_marks_history_without_error() {
    let ctx = require_db!();
    let rule = seed_rule(&ctx, 1).await;
    let history = server::repo::alert_history::create(&ctx.pool, rule.id, 3)
        .await
        .unwrap();

    let job = AlertNotificationJob {
        history_id: history.id,
        rule_id: rule.id,
        rule_name: rule.name.clone(),
        organization_id: ctx.seed.org.id,
        project_id: rule.project_id,
        log_count: 3,
        threshold: 1,
        time_window: 5,
        email_recipients: vec![],
        webhook_url: None,
    };
    server::alerts::notifier::run(&ctx.state, &job).await.unwrap();

    let updated = server::repo::alert_history::find_by_id(&ctx.pool, history.id)
        .await
        .unwrap()
        .unwrap();
    assert!(updated.notified);
    assert!(updated.error.is_none());
}

#[tokio::test]
async fn alert_rule_crud_over_http() {
    let ctx = require_db!();
    let token = Some(ctx.seed.admin_token.as_str());

    let (status, created) = post_json(
        &ctx.app,
        "/api/v1/alerts/rules",
        &json!({
            "organizationId": ctx.seed.org.id,
            "projectId": ctx.seed.project.id,
            "name": "errors spike",
            "levels": ["error"],
            "timeWindowMinutes": 10,
            "threshold": 50
        }),
        token,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap();

    let (status, _) = request(
        &ctx.app,
        "PUT",
        &format!("/api/v1/alerts/rules/{id}"),
        Some(&json!({"threshold": 25, "enabled": false})),
        token,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, listed) = get(
        &ctx.app,
        &format!("/api/v1/alerts/rules?organization_id={}", ctx.seed.org.id),
        token,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rule = listed
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["id"] == id)
        .unwrap();
    assert_eq!(rule["threshold"], 25);
    assert_eq!(rule["enabled"], false);

    let (status, _) = request(
        &ctx.app,
        "DELETE",
        &format!("/api/v1/alerts/rules/{id}"),
        None,
        token,
        &[],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn alert_rule_rejects_bad_levels_and_recipients() {
    let ctx = require_db!();
    let token = Some(ctx.seed.admin_token.as_str());

    let (status, _) = post_json(
        &ctx.app,
        "/api/v1/alerts/rules",
        &json!({
            "organizationId": ctx.seed.org.id,
            "name": "bad",
            "levels": ["verbose"],
            "timeWindowMinutes": 10,
            "threshold": 5
        }),
        token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &ctx.app,
        "/api/v1/alerts/rules",
        &json!({
            "organizationId": ctx.seed.org.id,
            "name": "bad",
            "levels": ["error"],
            "timeWindowMinutes": 10,
            "threshold": 5,
            "emailRecipients": ["not-an-email"]
        }),
        token,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
