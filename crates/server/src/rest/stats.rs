//! Aggregation endpoints: time-bucketed level histograms and top-N lists.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use shared_types::{AppError, LevelBucket, LogStatsParams, MessageCount, ServiceCount, TopNParams};
use uuid::Uuid;

use crate::auth::extractors::AuthRequired;
use crate::cache::keys;
use crate::db::AppState;
use crate::repo;

fn stats_cache_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parts.join(";").as_bytes());
    format!("{:x}", hasher.finalize())
}

fn parse_projects(raw: &Option<String>) -> Result<Vec<Uuid>, AppError> {
    raw.as_deref()
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(|p| {
                    Uuid::parse_str(p)
                        .map_err(|_| AppError::bad_request(format!("invalid project UUID: {p}")))
                })
                .collect()
        })
        .unwrap_or_else(|| Ok(Vec::new()))
}

// ---------------------------------------------------------------------------
// GET /api/v1/logs/stats
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/logs/stats",
    params(LogStatsParams),
    responses(
        (status = 200, description = "Level histogram", body = [LevelBucket])
    ),
    tag = "stats"
)]
pub async fn level_histogram(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Query(params): Query<LogStatsParams>,
) -> Result<Json<Vec<LevelBucket>>, AppError> {
    let projects = parse_projects(&params.projects)?;
    super::logs::authorize_projects(&state, &user, &projects).await?;

    let interval_raw = params.interval.as_deref().unwrap_or("5m");
    let interval = repo::logs::bucket_interval(interval_raw)
        .ok_or_else(|| AppError::bad_request(format!("invalid interval: {interval_raw}")))?;

    let to = params.to.unwrap_or_else(Utc::now);
    let from = params.from.unwrap_or(to - Duration::hours(24));
    let services: Vec<String> = params
        .services
        .as_deref()
        .map(|s| s.split(',').map(str::to_string).collect())
        .unwrap_or_default();

    let mut sorted_projects: Vec<String> = projects.iter().map(Uuid::to_string).collect();
    sorted_projects.sort();
    let cache_key = keys::logs_stats(&stats_cache_key(&[
        "histogram",
        &sorted_projects.join(","),
        &services.join(","),
        &from.to_rfc3339(),
        &to.to_rfc3339(),
        interval_raw,
    ]));
    if let Some(cached) = state.cache.get_json::<Vec<LevelBucket>>(&cache_key).await {
        return Ok(Json(cached));
    }

    let buckets =
        repo::logs::level_histogram(&state.pool, &projects, &services, from, to, interval).await?;
    state
        .cache
        .set_json(&cache_key, &buckets, crate::config::stats_cache_ttl_secs())
        .await;
    Ok(Json(buckets))
}

// ---------------------------------------------------------------------------
// GET /api/v1/logs/stats/services
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/logs/stats/services",
    params(TopNParams),
    responses(
        (status = 200, description = "Top services by volume", body = [ServiceCount])
    ),
    tag = "stats"
)]
pub async fn top_services(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Query(params): Query<TopNParams>,
) -> Result<Json<Vec<ServiceCount>>, AppError> {
    let projects = parse_projects(&params.projects)?;
    super::logs::authorize_projects(&state, &user, &projects).await?;

    let to = params.to.unwrap_or_else(Utc::now);
    let from = params.from.unwrap_or(to - Duration::hours(24));
    let n = params.n.unwrap_or(10).clamp(1, 100);

    let mut sorted_projects: Vec<String> = projects.iter().map(Uuid::to_string).collect();
    sorted_projects.sort();
    let cache_key = keys::logs_stats(&stats_cache_key(&[
        "top-services",
        &sorted_projects.join(","),
        &from.to_rfc3339(),
        &to.to_rfc3339(),
        &n.to_string(),
    ]));
    if let Some(cached) = state.cache.get_json::<Vec<ServiceCount>>(&cache_key).await {
        return Ok(Json(cached));
    }

    let top = repo::logs::top_services(&state.pool, &projects, from, to, n).await?;
    state
        .cache
        .set_json(&cache_key, &top, crate::config::stats_cache_ttl_secs())
        .await;
    Ok(Json(top))
}

// ---------------------------------------------------------------------------
// GET /api/v1/logs/stats/errors
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/logs/stats/errors",
    params(TopNParams),
    responses(
        (status = 200, description = "Top error messages", body = [MessageCount])
    ),
    tag = "stats"
)]
pub async fn top_errors(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Query(params): Query<TopNParams>,
) -> Result<Json<Vec<MessageCount>>, AppError> {
    let projects = parse_projects(&params.projects)?;
    super::logs::authorize_projects(&state, &user, &projects).await?;

    let to = params.to.unwrap_or_else(Utc::now);
    let from = params.from.unwrap_or(to - Duration::hours(24));
    let n = params.n.unwrap_or(10).clamp(1, 100);

    let mut sorted_projects: Vec<String> = projects.iter().map(Uuid::to_string).collect();
    sorted_projects.sort();
    let cache_key = keys::logs_stats(&stats_cache_key(&[
        "top-errors",
        &sorted_projects.join(","),
        &from.to_rfc3339(),
        &to.to_rfc3339(),
        &n.to_string(),
    ]));
    if let Some(cached) = state.cache.get_json::<Vec<MessageCount>>(&cache_key).await {
        return Ok(Json(cached));
    }

    let top = repo::logs::top_error_messages(&state.pool, &projects, from, to, n).await?;
    state
        .cache
        .set_json(&cache_key, &top, crate::config::stats_cache_ttl_secs())
        .await;
    Ok(Json(top))
}
