//! OTLP/HTTP ingestion endpoints. Authentication is by API key; the
//! response body always carries the OTLP partial-success shape.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use shared_types::{
    AppError, DetectionEvent, DetectionJob, LogsExportResponse, LogsPartialSuccess,
    TracesExportResponse, TracesPartialSuccess,
};

use crate::db::AppState;
use crate::jobs::Job;
use crate::otlp;
use crate::repo;
use crate::repo::api_keys::ApiKeyContext;

async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<ApiKeyContext, AppError> {
    let key = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::unauthorized("Missing X-API-Key header"))?;

    repo::api_keys::authenticate(&state.pool, key)
        .await?
        .ok_or_else(|| AppError::unauthorized("Invalid API key"))
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

// ---------------------------------------------------------------------------
// POST /v1/otlp/logs
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/otlp/logs",
    request_body = Vec<u8>,
    responses(
        (status = 200, description = "Export accepted", body = LogsExportResponse),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Invalid API key")
    ),
    tag = "otlp"
)]
pub async fn ingest_logs(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<LogsExportResponse>, AppError> {
    let ctx = authenticate(&state, &headers).await?;

    let tree = otlp::decode_logs_body(&body, content_type(&headers))
        .map_err(|e| AppError::bad_request(e.0))?;
    let new_logs = otlp::transform::transform_logs(&tree);
    let batch_size = new_logs.len() as i64;

    let inserted = match repo::logs::insert_batch(&state.pool, ctx.project_id, &new_logs).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, project_id = %ctx.project_id, "Log batch persist failed");
            return Ok(Json(LogsExportResponse {
                partial_success: LogsPartialSuccess {
                    rejected_log_records: batch_size,
                    error_message: "failed to persist log records".to_string(),
                },
            }));
        }
    };

    repo::api_keys::touch_last_used(&state.pool, ctx.api_key_id).await;

    // The write is committed; live tail and detection are best-effort.
    for log in &inserted {
        state.bus.publish(log).await;
    }

    if !inserted.is_empty() {
        let job = DetectionJob {
            logs: inserted
                .iter()
                .map(|log| DetectionEvent {
                    message: log.message.clone(),
                    level: log.level.clone(),
                    service: log.service.clone(),
                    time: log.time,
                    metadata: Some(log.metadata.clone()),
                })
                .collect(),
            organization_id: ctx.organization_id,
            project_id: Some(ctx.project_id),
        };
        state.jobs.enqueue(Job::Detection(job)).await;
    }

    Ok(Json(LogsExportResponse {
        partial_success: LogsPartialSuccess::default(),
    }))
}

// ---------------------------------------------------------------------------
// POST /v1/otlp/traces
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/v1/otlp/traces",
    request_body = Vec<u8>,
    responses(
        (status = 200, description = "Export accepted", body = TracesExportResponse),
        (status = 400, description = "Malformed body"),
        (status = 401, description = "Invalid API key")
    ),
    tag = "otlp"
)]
pub async fn ingest_traces(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TracesExportResponse>, AppError> {
    let ctx = authenticate(&state, &headers).await?;

    let tree = otlp::decode_traces_body(&body, content_type(&headers))
        .map_err(|e| AppError::bad_request(e.0))?;
    let (spans, aggregates) = otlp::transform::transform_spans(&tree);
    let batch_size = spans.len() as i64;

    // One transaction per batch: all span rows plus the trace upserts.
    let result: Result<(), AppError> = async {
        let mut tx = state
            .pool
            .begin()
            .await
            .map_err(crate::error_convert::sqlx_to_app_error)?;
        for span in &spans {
            repo::spans::insert(&mut *tx, ctx.project_id, ctx.organization_id, span).await?;
        }
        for aggregate in &aggregates {
            repo::traces::upsert(&mut *tx, ctx.project_id, aggregate).await?;
        }
        tx.commit()
            .await
            .map_err(crate::error_convert::sqlx_to_app_error)?;
        Ok(())
    }
    .await;

    if let Err(e) = result {
        tracing::error!(error = %e, project_id = %ctx.project_id, "Span batch persist failed");
        return Ok(Json(TracesExportResponse {
            partial_success: TracesPartialSuccess {
                rejected_spans: batch_size,
                error_message: "failed to persist spans".to_string(),
            },
        }));
    }

    repo::api_keys::touch_last_used(&state.pool, ctx.api_key_id).await;

    Ok(Json(TracesExportResponse {
        partial_success: TracesPartialSuccess::default(),
    }))
}

// ---------------------------------------------------------------------------
// GET /v1/otlp/{logs,traces} — health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/v1/otlp/logs",
    responses(
        (status = 200, description = "API key valid"),
        (status = 401, description = "Invalid API key")
    ),
    tag = "otlp"
)]
pub async fn logs_health(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    authenticate(&state, &headers).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}

#[utoipa::path(
    get,
    path = "/v1/otlp/traces",
    responses(
        (status = 200, description = "API key valid"),
        (status = 401, description = "Invalid API key")
    ),
    tag = "otlp"
)]
pub async fn traces_health(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    authenticate(&state, &headers).await?;
    Ok(Json(serde_json::json!({ "status": "ok" })))
}
