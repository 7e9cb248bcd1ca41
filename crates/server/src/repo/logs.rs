use chrono::{DateTime, Utc};
use shared_types::{AppError, LevelBucket, LogRecord, MessageCount, NewLog, ServiceCount};
use sqlx::{Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::cursor::Cursor;
use crate::error_convert::SqlxErrorExt;

const COLUMNS: &str = "id, time, project_id, service, level, message, metadata, trace_id, span_id";

/// Parsed filter set for log search. Multi-value filters use `= ANY`,
/// single values collapse to `=`.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub projects: Vec<Uuid>,
    pub services: Vec<String>,
    pub levels: Vec<String>,
    pub trace_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub q: Option<String>,
    pub cursor: Option<Cursor>,
    pub offset: i64,
    pub limit: i64,
}

impl LogFilter {
    /// Canonical cache-key string. Fields are serialized in declaration
    /// order and vectors are sorted, so equal filters always hash equal
    /// regardless of input order.
    pub fn cache_key(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut projects: Vec<String> = self.projects.iter().map(Uuid::to_string).collect();
        projects.sort();
        let mut services = self.services.clone();
        services.sort();
        let mut levels = self.levels.clone();
        levels.sort();

        let canonical = format!(
            "p={};s={};l={};t={};from={};to={};q={};cur={};off={};lim={}",
            projects.join(","),
            services.join(","),
            levels.join(","),
            self.trace_id.as_deref().unwrap_or(""),
            self.from.map(|t| t.to_rfc3339()).unwrap_or_default(),
            self.to.map(|t| t.to_rfc3339()).unwrap_or_default(),
            self.q.as_deref().unwrap_or(""),
            self.cursor.map(|c| c.encode()).unwrap_or_default(),
            self.offset,
            self.limit,
        );

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &LogFilter) {
    if filter.projects.len() == 1 {
        qb.push(" AND project_id = ").push_bind(filter.projects[0]);
    } else if !filter.projects.is_empty() {
        qb.push(" AND project_id = ANY(")
            .push_bind(filter.projects.clone())
            .push(")");
    }
    if filter.services.len() == 1 {
        qb.push(" AND service = ").push_bind(filter.services[0].clone());
    } else if !filter.services.is_empty() {
        qb.push(" AND service = ANY(")
            .push_bind(filter.services.clone())
            .push(")");
    }
    if filter.levels.len() == 1 {
        qb.push(" AND level = ").push_bind(filter.levels[0].clone());
    } else if !filter.levels.is_empty() {
        qb.push(" AND level = ANY(")
            .push_bind(filter.levels.clone())
            .push(")");
    }
    if let Some(trace_id) = &filter.trace_id {
        qb.push(" AND trace_id = ").push_bind(trace_id.clone());
    }
    if let Some(from) = filter.from {
        qb.push(" AND time >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND time <= ").push_bind(to);
    }
    if let Some(q) = &filter.q {
        qb.push(" AND to_tsvector('english', message) @@ plainto_tsquery('english', ")
            .push_bind(q.clone())
            .push(")");
    }
}

/// Fetch one page plus one row, `(time DESC, id DESC)`. The extra row
/// tells the caller whether a next cursor exists.
pub async fn search(
    pool: &Pool<Postgres>,
    filter: &LogFilter,
) -> Result<Vec<LogRecord>, AppError> {
    let mut qb = QueryBuilder::new(format!("SELECT {COLUMNS} FROM logs WHERE TRUE"));
    push_filters(&mut qb, filter);

    if let Some(cursor) = filter.cursor {
        qb.push(" AND (time < ")
            .push_bind(cursor.time)
            .push(" OR (time = ")
            .push_bind(cursor.time)
            .push(" AND id < ")
            .push_bind(cursor.id)
            .push("))");
    }

    qb.push(" ORDER BY time DESC, id DESC LIMIT ")
        .push_bind(filter.limit + 1);
    if filter.cursor.is_none() && filter.offset > 0 {
        qb.push(" OFFSET ").push_bind(filter.offset);
    }

    qb.build_query_as::<LogRecord>()
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)
}

/// Total row count for the same filter set, without ordering or paging.
pub async fn count(pool: &Pool<Postgres>, filter: &LogFilter) -> Result<i64, AppError> {
    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM logs WHERE TRUE");
    push_filters(&mut qb, filter);

    let row: (i64,) = qb
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(row.0)
}

/// Atomic batch insert. A single multi-row statement, so either the whole
/// batch lands or none of it does.
pub async fn insert_batch(
    pool: &Pool<Postgres>,
    project_id: Uuid,
    logs: &[NewLog],
) -> Result<Vec<LogRecord>, AppError> {
    if logs.is_empty() {
        return Ok(Vec::new());
    }

    let times: Vec<DateTime<Utc>> = logs.iter().map(|l| l.time).collect();
    let projects: Vec<Uuid> = logs.iter().map(|_| project_id).collect();
    let services: Vec<String> = logs.iter().map(|l| l.service.clone()).collect();
    let levels: Vec<String> = logs.iter().map(|l| l.level.clone()).collect();
    let messages: Vec<String> = logs.iter().map(|l| l.message.clone()).collect();
    let metadata: Vec<serde_json::Value> = logs.iter().map(|l| l.metadata.clone()).collect();
    let trace_ids: Vec<Option<String>> = logs.iter().map(|l| l.trace_id.clone()).collect();
    let span_ids: Vec<Option<String>> = logs.iter().map(|l| l.span_id.clone()).collect();

    sqlx::query_as::<_, LogRecord>(&format!(
        r#"
        INSERT INTO logs (time, project_id, service, level, message, metadata, trace_id, span_id)
        SELECT * FROM UNNEST(
            $1::timestamptz[], $2::uuid[], $3::text[], $4::text[],
            $5::text[], $6::jsonb[], $7::text[], $8::text[]
        )
        RETURNING {COLUMNS}
        "#
    ))
    .bind(&times)
    .bind(&projects)
    .bind(&services)
    .bind(&levels)
    .bind(&messages)
    .bind(&metadata)
    .bind(&trace_ids)
    .bind(&span_ids)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Surrounding rows for a single log: `before` newest-first, `after`
/// oldest-first, plus the anchor row when `log_id` is given.
pub async fn context(
    pool: &Pool<Postgres>,
    project_id: Uuid,
    time: DateTime<Utc>,
    log_id: Option<Uuid>,
    before: i64,
    after: i64,
) -> Result<(Vec<LogRecord>, Option<LogRecord>, Vec<LogRecord>), AppError> {
    let before_rows = sqlx::query_as::<_, LogRecord>(&format!(
        "SELECT {COLUMNS} FROM logs WHERE project_id = $1 AND time < $2 \
         ORDER BY time DESC, id DESC LIMIT $3"
    ))
    .bind(project_id)
    .bind(time)
    .bind(before)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    let current = match log_id {
        Some(id) => sqlx::query_as::<_, LogRecord>(&format!(
            "SELECT {COLUMNS} FROM logs WHERE project_id = $1 AND id = $2"
        ))
        .bind(project_id)
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?,
        None => None,
    };

    let after_rows = sqlx::query_as::<_, LogRecord>(&format!(
        "SELECT {COLUMNS} FROM logs WHERE project_id = $1 AND time > $2 \
         ORDER BY time ASC, id ASC LIMIT $3"
    ))
    .bind(project_id)
    .bind(time)
    .bind(after)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)?;

    Ok((before_rows, current, after_rows))
}

/// All logs of one trace, oldest first.
pub async fn by_trace(
    pool: &Pool<Postgres>,
    project_id: Uuid,
    trace_id: &str,
) -> Result<Vec<LogRecord>, AppError> {
    sqlx::query_as::<_, LogRecord>(&format!(
        "SELECT {COLUMNS} FROM logs WHERE project_id = $1 AND trace_id = $2 ORDER BY time ASC"
    ))
    .bind(project_id)
    .bind(trace_id)
    .fetch_all(pool)
    .await
    .map_err(SqlxErrorExt::into_app_error)
}

/// Supported histogram intervals.
pub fn bucket_interval(raw: &str) -> Option<&'static str> {
    match raw {
        "1m" => Some("1 minute"),
        "5m" => Some("5 minutes"),
        "1h" => Some("1 hour"),
        "1d" => Some("1 day"),
        _ => None,
    }
}

/// Time-bucketed counts by level, assembled into one entry per bucket.
pub async fn level_histogram(
    pool: &Pool<Postgres>,
    projects: &[Uuid],
    services: &[String],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    interval: &str,
) -> Result<Vec<LevelBucket>, AppError> {
    let mut qb = QueryBuilder::new("SELECT time_bucket(");
    qb.push_bind(interval)
        .push("::interval, time) AS bucket, level, COUNT(*) FROM logs WHERE time >= ")
        .push_bind(from)
        .push(" AND time <= ")
        .push_bind(to);
    if !projects.is_empty() {
        qb.push(" AND project_id = ANY(")
            .push_bind(projects.to_vec())
            .push(")");
    }
    if !services.is_empty() {
        qb.push(" AND service = ANY(")
            .push_bind(services.to_vec())
            .push(")");
    }
    qb.push(" GROUP BY bucket, level ORDER BY bucket ASC");

    let rows: Vec<(DateTime<Utc>, String, i64)> = qb
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;

    let mut buckets: Vec<LevelBucket> = Vec::new();
    for (bucket, level, count) in rows {
        match buckets.last_mut() {
            Some(last) if last.bucket == bucket => {
                last.total += count;
                last.by_level.insert(level, count);
            }
            _ => {
                let mut by_level = std::collections::HashMap::new();
                by_level.insert(level, count);
                buckets.push(LevelBucket {
                    bucket,
                    total: count,
                    by_level,
                });
            }
        }
    }
    Ok(buckets)
}

pub async fn top_services(
    pool: &Pool<Postgres>,
    projects: &[Uuid],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    n: i64,
) -> Result<Vec<ServiceCount>, AppError> {
    let mut qb = QueryBuilder::new(
        "SELECT service, COUNT(*) AS count FROM logs WHERE time >= ",
    );
    qb.push_bind(from).push(" AND time <= ").push_bind(to);
    if !projects.is_empty() {
        qb.push(" AND project_id = ANY(")
            .push_bind(projects.to_vec())
            .push(")");
    }
    qb.push(" GROUP BY service ORDER BY count DESC LIMIT ")
        .push_bind(n);

    let rows: Vec<(String, i64)> = qb
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(rows
        .into_iter()
        .map(|(service, count)| ServiceCount { service, count })
        .collect())
}

pub async fn top_error_messages(
    pool: &Pool<Postgres>,
    projects: &[Uuid],
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    n: i64,
) -> Result<Vec<MessageCount>, AppError> {
    let mut qb = QueryBuilder::new(
        "SELECT message, COUNT(*) AS count FROM logs \
         WHERE level IN ('error', 'critical') AND time >= ",
    );
    qb.push_bind(from).push(" AND time <= ").push_bind(to);
    if !projects.is_empty() {
        qb.push(" AND project_id = ANY(")
            .push_bind(projects.to_vec())
            .push(")");
    }
    qb.push(" GROUP BY message ORDER BY count DESC LIMIT ")
        .push_bind(n);

    let rows: Vec<(String, i64)> = qb
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(rows
        .into_iter()
        .map(|(message, count)| MessageCount { message, count })
        .collect())
}

/// Distinct service names for filter dropdowns.
pub async fn distinct_services(
    pool: &Pool<Postgres>,
    projects: &[Uuid],
) -> Result<Vec<String>, AppError> {
    let mut qb = QueryBuilder::new("SELECT DISTINCT service FROM logs WHERE TRUE");
    if !projects.is_empty() {
        qb.push(" AND project_id = ANY(")
            .push_bind(projects.to_vec())
            .push(")");
    }
    qb.push(" ORDER BY service");

    let rows: Vec<(String,)> = qb
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(rows.into_iter().map(|(s,)| s).collect())
}

/// Windowed count for alert evaluation.
pub async fn count_for_alert(
    pool: &Pool<Postgres>,
    organization_id: Uuid,
    project_id: Option<Uuid>,
    service: Option<&str>,
    levels: &[String],
    window_minutes: i32,
) -> Result<i64, AppError> {
    let mut qb = QueryBuilder::new(
        "SELECT COUNT(*) FROM logs l JOIN projects p ON p.id = l.project_id \
         WHERE p.organization_id = ",
    );
    qb.push_bind(organization_id)
        .push(" AND l.time >= NOW() - make_interval(mins => ")
        .push_bind(window_minutes)
        .push(")");
    if let Some(project_id) = project_id {
        qb.push(" AND l.project_id = ").push_bind(project_id);
    }
    if let Some(service) = service {
        qb.push(" AND l.service = ").push_bind(service.to_string());
    }
    if !levels.is_empty() {
        qb.push(" AND l.level = ANY(")
            .push_bind(levels.to_vec())
            .push(")");
    }

    let row: (i64,) = qb
        .build_query_as()
        .fetch_one(pool)
        .await
        .map_err(SqlxErrorExt::into_app_error)?;
    Ok(row.0)
}
