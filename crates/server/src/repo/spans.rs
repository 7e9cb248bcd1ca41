use shared_types::{AppError, NewSpan, SpanRecord};
use sqlx::{PgConnection, Pool, Postgres};
use uuid::Uuid;

use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "id, time, project_id, organization_id, trace_id, span_id, parent_span_id, \
                       service_name, operation_name, start_time, end_time, duration_ms, kind, \
                       status_code, status_message, attributes, events, links, resource_attributes";

/// Insert one span row. Callers run this inside the per-batch transaction
/// so the batch stays atomic.
pub async fn insert(
    conn: &mut PgConnection,
    project_id: Uuid,
    organization_id: Uuid,
    span: &NewSpan,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO spans
            (time, project_id, organization_id, trace_id, span_id, parent_span_id,
             service_name, operation_name, start_time, end_time, duration_ms, kind,
             status_code, status_message, attributes, events, links, resource_attributes)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(span.start_time)
    .bind(project_id)
    .bind(organization_id)
    .bind(&span.trace_id)
    .bind(&span.span_id)
    .bind(&span.parent_span_id)
    .bind(&span.service_name)
    .bind(&span.operation_name)
    .bind(span.start_time)
    .bind(span.end_time)
    .bind(span.duration_ms)
    .bind(&span.kind)
    .bind(&span.status_code)
    .bind(&span.status_message)
    .bind(&span.attributes)
    .bind(&span.events)
    .bind(&span.links)
    .bind(&span.resource_attributes)
    .execute(conn)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;
    Ok(())
}

pub async fn by_trace(
    pool: &Pool<Postgres>,
    project_id: Uuid,
    trace_id: &str,
) -> Result<Vec<SpanRecord>, AppError> {
    sqlx::query_as::<_, SpanRecord>(&format!(
        "SELECT {COLUMNS} FROM spans WHERE project_id = $1 AND trace_id = $2 \
         ORDER BY start_time ASC"
    ))
    .bind(project_id)
    .bind(trace_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}
