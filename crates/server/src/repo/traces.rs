use shared_types::{AppError, TraceAggregate, TraceSummary};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "project_id, trace_id, service_name, root_service_name, \
                       root_operation_name, start_time, end_time, duration_ms, span_count, error";

/// Merge one batch aggregate into the trace summary row. The window only
/// widens: start takes the minimum, end the maximum, and the span count
/// accumulates across batches. The first observed service name sticks;
/// root fields update when the batch saw a parentless span.
pub async fn upsert(
    conn: &mut PgConnection,
    project_id: Uuid,
    aggregate: &TraceAggregate,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO traces
            (project_id, trace_id, service_name, root_service_name, root_operation_name,
             start_time, end_time, duration_ms, span_count, error)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (project_id, trace_id) DO UPDATE SET
            start_time = LEAST(traces.start_time, EXCLUDED.start_time),
            end_time = GREATEST(traces.end_time, EXCLUDED.end_time),
            duration_ms = EXTRACT(EPOCH FROM (
                GREATEST(traces.end_time, EXCLUDED.end_time)
                - LEAST(traces.start_time, EXCLUDED.start_time)
            )) * 1000.0,
            span_count = traces.span_count + EXCLUDED.span_count,
            error = traces.error OR EXCLUDED.error,
            root_service_name = COALESCE(EXCLUDED.root_service_name, traces.root_service_name),
            root_operation_name = COALESCE(EXCLUDED.root_operation_name, traces.root_operation_name)
        "#,
    )
    .bind(project_id)
    .bind(&aggregate.trace_id)
    .bind(&aggregate.service_name)
    .bind(&aggregate.root_service_name)
    .bind(&aggregate.root_operation_name)
    .bind(aggregate.start_time)
    .bind(aggregate.end_time)
    .bind(aggregate.duration_ms)
    .bind(aggregate.span_count)
    .bind(aggregate.error)
    .execute(conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

pub async fn find(
    pool: &Pool<Postgres>,
    project_id: Uuid,
    trace_id: &str,
) -> Result<Option<TraceSummary>, AppError> {
    sqlx::query_as::<_, TraceSummary>(&format!(
        "SELECT {COLUMNS} FROM traces WHERE project_id = $1 AND trace_id = $2"
    ))
    .bind(project_id)
    .bind(trace_id)
    .fetch_optional(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}
