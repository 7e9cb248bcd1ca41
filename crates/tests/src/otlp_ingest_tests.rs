use axum::http::StatusCode;
use serde_json::json;

use crate::common::*;
use crate::require_db;

fn logs_payload() -> serde_json::Value {
    json!({
        "resourceLogs": [{
            "resource": {
                "attributes": [
                    {"key": "service.name", "value": {"stringValue": "svc"}}
                ]
            },
            "scopeLogs": [{
                "logRecords": [{
                    "severityNumber": 17,
                    "body": {"stringValue": "boom"},
                    "timeUnixNano": "1704067200000000000"
                }]
            }]
        }]
    })
}

#[tokio::test]
async fn otlp_logs_ingest_end_to_end() {
    let ctx = require_db!();

    let (status, resp) = post_raw(
        &ctx.app,
        "/v1/otlp/logs",
        logs_payload().to_string().into_bytes(),
        &[
            ("content-type", "application/json"),
            ("x-api-key", &ctx.seed.api_key),
        ],
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["partialSuccess"]["rejectedLogRecords"], 0);

    let row: (String, String, String, chrono::DateTime<chrono::Utc>) = sqlx::query_as(
        "SELECT service, level, message, time FROM logs WHERE project_id = $1",
    )
    .bind(ctx.seed.project.id)
    .fetch_one(&ctx.pool)
    .await
    .expect("ingested log row missing");

    assert_eq!(row.0, "svc");
    assert_eq!(row.1, "error");
    assert_eq!(row.2, "boom");
    assert_eq!(row.3.to_rfc3339(), "2024-01-01T00:00:00+00:00");
}

#[tokio::test]
async fn otlp_logs_rejects_missing_api_key() {
    let ctx = require_db!();

    let (status, _) = post_raw(
        &ctx.app,
        "/v1/otlp/logs",
        logs_payload().to_string().into_bytes(),
        &[("content-type", "application/json")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn otlp_logs_rejects_invalid_api_key() {
    let ctx = require_db!();

    let (status, _) = post_raw(
        &ctx.app,
        "/v1/otlp/logs",
        logs_payload().to_string().into_bytes(),
        &[
            ("content-type", "application/json"),
            ("x-api-key", "not-a-real-key"),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn otlp_logs_rejects_malformed_body() {
    let ctx = require_db!();

    let (status, resp) = post_raw(
        &ctx.app,
        "/v1/otlp/logs",
        b"[1, 2, 3]".to_vec(),
        &[
            ("content-type", "application/json"),
            ("x-api-key", &ctx.seed.api_key),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["message"], "invalid body type");
}

#[tokio::test]
async fn otlp_gzip_body_without_content_encoding() {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let ctx = require_db!();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(logs_payload().to_string().as_bytes())
        .unwrap();
    let compressed = encoder.finish().unwrap();

    let (status, resp) = post_raw(
        &ctx.app,
        "/v1/otlp/logs",
        compressed,
        &[
            ("content-type", "application/json"),
            ("x-api-key", &ctx.seed.api_key),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["partialSuccess"]["rejectedLogRecords"], 0);
}

#[tokio::test]
async fn otlp_health_endpoints_authenticate() {
    let ctx = require_db!();

    let (status, resp) = request(
        &ctx.app,
        "GET",
        "/v1/otlp/logs",
        None,
        None,
        &[("x-api-key", &ctx.seed.api_key)],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["status"], "ok");

    let (status, _) = request(&ctx.app, "GET", "/v1/otlp/traces", None, None, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn otlp_traces_ingest_builds_trace_aggregate() {
    let ctx = require_db!();

    let trace_id = "ab".repeat(16);
    let payload = json!({
        "resourceSpans": [{
            "resource": {
                "attributes": [{"key": "service.name", "value": {"stringValue": "api"}}]
            },
            "scopeSpans": [{
                "spans": [
                    {
                        "traceId": trace_id,
                        "spanId": "01".repeat(8),
                        "name": "handle-request",
                        "kind": 2,
                        "startTimeUnixNano": "1704067200000000000",
                        "endTimeUnixNano": "1704067201000000000",
                        "status": {"code": 0}
                    },
                    {
                        "traceId": trace_id,
                        "spanId": "02".repeat(8),
                        "parentSpanId": "01".repeat(8),
                        "name": "query-db",
                        "kind": 3,
                        "startTimeUnixNano": "1704067200200000000",
                        "endTimeUnixNano": "1704067200700000000",
                        "status": {"code": 2, "message": "timeout"}
                    }
                ]
            }]
        }]
    });

    let (status, resp) = post_raw(
        &ctx.app,
        "/v1/otlp/traces",
        payload.to_string().into_bytes(),
        &[
            ("content-type", "application/json"),
            ("x-api-key", &ctx.seed.api_key),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(resp["partialSuccess"]["rejectedSpans"], 0);

    let trace = server::repo::traces::find(&ctx.pool, ctx.seed.project.id, &trace_id)
        .await
        .unwrap()
        .expect("trace aggregate missing");
    assert_eq!(trace.span_count, 2);
    assert!(trace.error);
    assert_eq!(trace.root_operation_name.as_deref(), Some("handle-request"));
    assert_eq!(trace.root_service_name.as_deref(), Some("api"));
    assert_eq!(trace.duration_ms, 1000.0);

    let spans = server::repo::spans::by_trace(&ctx.pool, ctx.seed.project.id, &trace_id)
        .await
        .unwrap();
    assert_eq!(spans.len(), 2);
    assert_eq!(spans[0].kind, "SERVER");
    assert_eq!(spans[1].status_code, "ERROR");
    assert_eq!(spans[1].status_message.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn otlp_traces_second_batch_accumulates_span_count() {
    let ctx = require_db!();

    let trace_id = "cd".repeat(16);
    let span = |id: &str, start: u64, end: u64| {
        json!({
            "traceId": trace_id,
            "spanId": id,
            "parentSpanId": "01".repeat(8),
            "name": "op",
            "startTimeUnixNano": start.to_string(),
            "endTimeUnixNano": end.to_string()
        })
    };
    let wrap = |spans: serde_json::Value| {
        json!({"resourceSpans": [{"scopeSpans": [{"spans": spans}]}]})
    };

    for batch in [
        wrap(json!([span(&"02".repeat(8), 1_000_000_000, 2_000_000_000)])),
        wrap(json!([span(&"03".repeat(8), 500_000_000, 1_500_000_000)])),
    ] {
        let (status, _) = post_raw(
            &ctx.app,
            "/v1/otlp/traces",
            batch.to_string().into_bytes(),
            &[
                ("content-type", "application/json"),
                ("x-api-key", &ctx.seed.api_key),
            ],
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let trace = server::repo::traces::find(&ctx.pool, ctx.seed.project.id, &trace_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(trace.span_count, 2);
    // Window widened across batches: 0.5s..2.0s.
    assert_eq!(trace.duration_ms, 1500.0);
}
