use axum::http::StatusCode;
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use shared_types::NewLog;

use crate::common::*;
use crate::require_db;

async fn seed_logs(ctx: &TestContext, count: usize) -> chrono::DateTime<chrono::Utc> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let logs: Vec<NewLog> = (0..count)
        .map(|i| NewLog {
            time: base + Duration::seconds(i as i64),
            service: "api".to_string(),
            level: if i % 2 == 0 { "info" } else { "error" }.to_string(),
            message: format!("log-{i}"),
            metadata: json!({"index": i}),
            trace_id: Some("ab".repeat(16)),
            span_id: None,
        })
        .collect();
    server::repo::logs::insert_batch(&ctx.pool, ctx.seed.project.id, &logs)
        .await
        .expect("Failed to seed logs");
    base
}

#[tokio::test]
async fn cursor_pagination_visits_every_row_once() {
    let ctx = require_db!();
    seed_logs(&ctx, 5).await;

    let path = format!(
        "/api/v1/logs?projects={}&limit=2",
        ctx.seed.project.id
    );
    let (status, page1) = get(&ctx.app, &path, Some(ctx.seed.admin_token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page1["total"], 5);
    assert_eq!(page1["logs"][0]["message"], "log-4");
    assert_eq!(page1["logs"][1]["message"], "log-3");

    let cursor = page1["nextCursor"].as_str().expect("nextCursor missing");
    // The cursor is base64 of "<ISO time>,<id>" for the last returned row.
    let decoded = server::cursor::Cursor::decode(cursor).expect("cursor must decode");
    assert_eq!(decoded.time.to_rfc3339(), "2024-01-01T00:00:03+00:00");

    let (status, page2) = get(
        &ctx.app,
        &format!("{path}&cursor={}", urlencoded(cursor)),
        Some(ctx.seed.admin_token.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page2["logs"][0]["message"], "log-2");
    assert_eq!(page2["logs"][1]["message"], "log-1");

    let cursor2 = page2["nextCursor"].as_str().unwrap();
    let (status, page3) = get(
        &ctx.app,
        &format!("{path}&cursor={}", urlencoded(cursor2)),
        Some(ctx.seed.admin_token.as_str()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page3["logs"][0]["message"], "log-0");
    assert!(page3["nextCursor"].is_null());
}

fn urlencoded(raw: &str) -> String {
    raw.replace('+', "%2B").replace('/', "%2F").replace('=', "%3D")
}

#[tokio::test]
async fn invalid_cursor_is_ignored_not_fatal() {
    let ctx = require_db!();
    seed_logs(&ctx, 3).await;

    let path = format!(
        "/api/v1/logs?projects={}&limit=10&cursor=garbage",
        ctx.seed.project.id
    );
    let (status, resp) = get(&ctx.app, &path, Some(ctx.seed.admin_token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["logs"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn level_filter_and_total() {
    let ctx = require_db!();
    seed_logs(&ctx, 6).await;

    let path = format!(
        "/api/v1/logs?projects={}&levels=error",
        ctx.seed.project.id
    );
    let (status, resp) = get(&ctx.app, &path, Some(ctx.seed.admin_token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["total"], 3);
    for log in resp["logs"].as_array().unwrap() {
        assert_eq!(log["level"], "error");
    }
}

#[tokio::test]
async fn invalid_level_is_rejected() {
    let ctx = require_db!();
    let path = format!(
        "/api/v1/logs?projects={}&levels=verbose",
        ctx.seed.project.id
    );
    let (status, _) = get(&ctx.app, &path, Some(ctx.seed.admin_token.as_str())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn query_requires_authentication() {
    let ctx = require_db!();
    let (status, _) = get(&ctx.app, "/api/v1/logs", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logs_by_trace_ordered_ascending() {
    let ctx = require_db!();
    seed_logs(&ctx, 4).await;

    let path = format!(
        "/api/v1/logs/trace/{}?project_id={}",
        "ab".repeat(16),
        ctx.seed.project.id
    );
    let (status, resp) = get(&ctx.app, &path, Some(ctx.seed.admin_token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    let logs = resp.as_array().unwrap();
    assert_eq!(logs.len(), 4);
    assert_eq!(logs[0]["message"], "log-0");
    assert_eq!(logs[3]["message"], "log-3");
}

#[tokio::test]
async fn context_query_is_chronological() {
    let ctx = require_db!();
    let base = seed_logs(&ctx, 9).await;
    let anchor = base + Duration::seconds(4);

    let path = format!(
        "/api/v1/logs/context?project_id={}&time={}&before=3&after=3",
        ctx.seed.project.id,
        urlencoded(&anchor.to_rfc3339())
    );
    let (status, resp) = get(&ctx.app, &path, Some(ctx.seed.admin_token.as_str())).await;
    assert_eq!(status, StatusCode::OK);

    let before: Vec<&str> = resp["before"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["message"].as_str().unwrap())
        .collect();
    let after: Vec<&str> = resp["after"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["message"].as_str().unwrap())
        .collect();

    assert_eq!(before, vec!["log-1", "log-2", "log-3"]);
    assert_eq!(after, vec!["log-5", "log-6", "log-7"]);
}

#[tokio::test]
async fn distinct_services_lists_seeded_service() {
    let ctx = require_db!();
    seed_logs(&ctx, 2).await;

    let path = format!("/api/v1/logs/services?projects={}", ctx.seed.project.id);
    let (status, resp) = get(&ctx.app, &path, Some(ctx.seed.admin_token.as_str())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp.as_array().unwrap(), &[json!("api")]);
}
