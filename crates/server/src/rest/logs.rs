//! Log query endpoints: filtered search with cursor pagination, context
//! around a single log, by-trace lookup, and the distinct-service list.

use axum::extract::{Query, State};
use axum::Json;
use shared_types::{
    AppError, LogContextParams, LogContextResponse, LogQueryParams, LogQueryResponse, User,
};
use uuid::Uuid;

use crate::auth::extractors::AuthRequired;
use crate::cache::keys;
use crate::cursor::Cursor;
use crate::db::AppState;
use crate::repo;
use crate::repo::logs::LogFilter;

const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

fn split_csv(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_uuid_list(raw: &Option<String>, field: &str) -> Result<Vec<Uuid>, AppError> {
    split_csv(raw)
        .into_iter()
        .map(|part| {
            Uuid::parse_str(&part)
                .map_err(|_| AppError::bad_request(format!("invalid {field} UUID: {part}")))
        })
        .collect()
}

/// Enforce that the user may read every listed project. Admins see all
/// tenants; everyone else needs membership in each owning organization.
pub async fn authorize_projects(
    state: &AppState,
    user: &User,
    projects: &[Uuid],
) -> Result<(), AppError> {
    if user.is_admin {
        return Ok(());
    }
    for project_id in projects {
        let project = repo::projects::find_by_id(&state.pool, *project_id)
            .await?
            .ok_or_else(|| AppError::not_found("Project not found"))?;
        if !repo::organizations::is_member(&state.pool, user.id, project.organization_id).await? {
            return Err(AppError::forbidden("Not a member of this project's organization"));
        }
    }
    Ok(())
}

fn build_filter(params: &LogQueryParams) -> Result<LogFilter, AppError> {
    let cursor = params.cursor.as_deref().and_then(|raw| {
        let decoded = Cursor::decode(raw);
        if decoded.is_none() {
            tracing::warn!(cursor = raw, "Ignoring invalid pagination cursor");
        }
        decoded
    });

    for level in split_csv(&params.levels) {
        if !shared_types::LogLevel::is_valid(&level) {
            return Err(AppError::bad_request(format!("invalid level: {level}")));
        }
    }

    Ok(LogFilter {
        projects: parse_uuid_list(&params.projects, "project")?,
        services: split_csv(&params.services),
        levels: split_csv(&params.levels),
        trace_id: params.trace_id.clone(),
        from: params.from,
        to: params.to,
        q: params.q.clone(),
        cursor,
        offset: params.offset.unwrap_or(0).max(0),
        limit: params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
    })
}

// ---------------------------------------------------------------------------
// GET /api/v1/logs
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/logs",
    params(LogQueryParams),
    responses(
        (status = 200, description = "Matching logs", body = LogQueryResponse)
    ),
    tag = "logs"
)]
pub async fn query_logs(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<LogQueryResponse>, AppError> {
    let filter = build_filter(&params)?;
    authorize_projects(&state, &user, &filter.projects).await?;

    let cache_key = keys::logs_query(&filter.cache_key());
    if let Some(cached) = state.cache.get_json::<LogQueryResponse>(&cache_key).await {
        return Ok(Json(cached));
    }

    let mut logs = repo::logs::search(&state.pool, &filter).await?;
    let next_cursor = if logs.len() as i64 > filter.limit {
        logs.truncate(filter.limit as usize);
        logs.last().map(|log| Cursor::new(log.time, log.id).encode())
    } else {
        None
    };
    let total = repo::logs::count(&state.pool, &filter).await?;

    let response = LogQueryResponse {
        logs,
        total,
        limit: filter.limit,
        offset: filter.offset,
        next_cursor,
    };
    state
        .cache
        .set_json(&cache_key, &response, crate::config::query_cache_ttl_secs())
        .await;
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// GET /api/v1/logs/context
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/logs/context",
    params(LogContextParams),
    responses(
        (status = 200, description = "Surrounding logs", body = LogContextResponse)
    ),
    tag = "logs"
)]
pub async fn log_context(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Query(params): Query<LogContextParams>,
) -> Result<Json<LogContextResponse>, AppError> {
    authorize_projects(&state, &user, &[params.project_id]).await?;

    let before = params.before.unwrap_or(10).clamp(0, 100);
    let after = params.after.unwrap_or(10).clamp(0, 100);

    let (mut before_rows, current, after_rows) = repo::logs::context(
        &state.pool,
        params.project_id,
        params.time,
        params.log_id,
        before,
        after,
    )
    .await?;

    // Chronological presentation: the before-list flips to oldest-first.
    before_rows.reverse();

    Ok(Json(LogContextResponse {
        before: before_rows,
        current,
        after: after_rows,
    }))
}

// ---------------------------------------------------------------------------
// GET /api/v1/logs/trace/{trace_id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/logs/trace/{trace_id}",
    params(
        ("trace_id" = String, Path, description = "Trace identifier (hex)"),
        shared_types::TraceLogsParams
    ),
    responses(
        (status = 200, description = "Logs of one trace")
    ),
    tag = "logs"
)]
pub async fn logs_by_trace(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    axum::extract::Path(trace_id): axum::extract::Path<String>,
    Query(params): Query<shared_types::TraceLogsParams>,
) -> Result<Json<Vec<shared_types::LogRecord>>, AppError> {
    authorize_projects(&state, &user, &[params.project_id]).await?;

    let cache_key = keys::logs_trace(params.project_id, &trace_id);
    if let Some(cached) = state
        .cache
        .get_json::<Vec<shared_types::LogRecord>>(&cache_key)
        .await
    {
        return Ok(Json(cached));
    }

    let logs = repo::logs::by_trace(&state.pool, params.project_id, &trace_id).await?;
    state
        .cache
        .set_json(&cache_key, &logs, crate::config::trace_cache_ttl_secs())
        .await;
    Ok(Json(logs))
}

// ---------------------------------------------------------------------------
// GET /api/v1/logs/services
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/logs/services",
    responses(
        (status = 200, description = "Distinct service names")
    ),
    tag = "logs"
)]
pub async fn distinct_services(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Query(params): Query<LogQueryParams>,
) -> Result<Json<Vec<String>>, AppError> {
    let projects = parse_uuid_list(&params.projects, "project")?;
    authorize_projects(&state, &user, &projects).await?;

    let mut sorted: Vec<String> = projects.iter().map(Uuid::to_string).collect();
    sorted.sort();
    let cache_key = keys::logs_services(&sorted.join(","));
    if let Some(cached) = state.cache.get_json::<Vec<String>>(&cache_key).await {
        return Ok(Json(cached));
    }

    let services = repo::logs::distinct_services(&state.pool, &projects).await?;
    state
        .cache
        .set_json(&cache_key, &services, crate::config::stats_cache_ttl_secs())
        .await;
    Ok(Json(services))
}
