//! Organization-scoped SSE event stream for SIEM dashboards. EventSource
//! cannot set headers, so the session token arrives as `?token=` (handled
//! by the auth middleware).

use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{select_all, Stream, StreamExt};
use shared_types::{AppError, LogRecord, SiemEventsParams, TailFrame};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::auth::extractors::AuthRequired;
use crate::db::AppState;
use crate::repo;

fn matches_incident(log: &LogRecord, incident_id: &Option<Uuid>) -> bool {
    match incident_id {
        None => true,
        Some(incident) => log
            .metadata
            .get("incidentId")
            .and_then(|v| v.as_str())
            .map(|raw| raw == incident.to_string())
            .unwrap_or(false),
    }
}

/// GET /api/v1/siem/events
pub async fn siem_events(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Query(params): Query<SiemEventsParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    if !user.is_admin
        && !repo::organizations::is_member(&state.pool, user.id, params.organization_id).await?
    {
        return Err(AppError::forbidden("Not a member of this organization"));
    }

    let project_ids = match params.project_id {
        Some(project_id) => vec![project_id],
        None => repo::projects::ids_for_organization(&state.pool, params.organization_id).await?,
    };

    let subscriptions: Vec<BroadcastStream<LogRecord>> = project_ids
        .iter()
        .map(|id| BroadcastStream::new(state.bus.subscribe(*id)))
        .collect();

    let incident_id = params.incident_id;
    let stream = select_all(subscriptions).filter_map(move |item| {
        let frame = match item {
            Ok(log) if matches_incident(&log, &incident_id) => Some(TailFrame::Log { log }),
            Ok(_) => None,
            Err(BroadcastStreamRecvError::Lagged(count)) => Some(TailFrame::Dropped { count }),
        };
        let event = frame.and_then(|frame| Event::default().json_data(&frame).ok().map(Ok));
        futures::future::ready(event)
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
