//! WebSocket live tail for the search UI: one project per connection,
//! optional service/level filters applied subscriber-side.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use shared_types::{AppError, LogRecord, TailFrame, TailParams};
use tokio::sync::broadcast;

use crate::auth::extractors::AuthRequired;
use crate::db::AppState;

/// GET /api/v1/logs/tail — authentication and membership are checked
/// before the connection is hijacked.
pub async fn tail_logs(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Query(params): Query<TailParams>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    super::logs::authorize_projects(&state, &user, &[params.project_id]).await?;

    let rx = state.bus.subscribe(params.project_id);
    let service = params.service.clone();
    let level = params.level.clone();
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, rx, service, level)))
}

fn matches_filters(log: &LogRecord, service: &Option<String>, level: &Option<String>) -> bool {
    if let Some(service) = service {
        if &log.service != service {
            return false;
        }
    }
    if let Some(level) = level {
        if &log.level != level {
            return false;
        }
    }
    true
}

async fn handle_socket(
    mut socket: WebSocket,
    mut rx: broadcast::Receiver<LogRecord>,
    service: Option<String>,
    level: Option<String>,
) {
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                // Client closed or errored; drop the subscription promptly.
                match incoming {
                    None | Some(Err(_)) => break,
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(_)) => continue,
                }
            }
            event = rx.recv() => {
                let frame = match event {
                    Ok(log) => {
                        if !matches_filters(&log, &service, &level) {
                            continue;
                        }
                        TailFrame::Log { log }
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        TailFrame::Dropped { count }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let Ok(text) = serde_json::to_string(&frame) else {
                    continue;
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }
}
