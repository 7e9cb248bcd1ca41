use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use shared_types::{AppError, AuthMode, User};

use super::extractors::CurrentUser;
use crate::db::AppState;
use crate::repo;

/// Paths served without a session. OTLP endpoints authenticate with an
/// API key inside their handlers; the auth routes must be reachable to
/// log in at all.
const PUBLIC_PREFIXES: &[&str] = &[
    "/health",
    "/v1/otlp/",
    "/api/v1/auth/",
    "/api/v1/organizations/",
    "/api/v1/projects/",
    "/api/v1/alerts/",
    "/api/v1/notifications/",
];

fn is_public(path: &str) -> bool {
    PUBLIC_PREFIXES
        .iter()
        .any(|prefix| path == prefix.trim_end_matches('/') || path.starts_with(prefix))
}

fn bearer_token(req: &Request) -> Option<String> {
    if let Some(value) = req.headers().get(axum::http::header::AUTHORIZATION) {
        if let Ok(raw) = value.to_str() {
            if let Some(token) = raw.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }
    // EventSource cannot set headers; SSE clients pass ?token= instead.
    req.uri().query().and_then(|query| {
        query.split('&').find_map(|pair| {
            pair.strip_prefix("token=")
                .map(|t| urlencoding::decode(t).map(|s| s.into_owned()).unwrap_or_else(|_| t.to_string()))
        })
    })
}

/// Session middleware: selects between standard and auth-free mode per
/// request, attaches the resolved user, and enforces authentication on
/// non-public paths.
pub async fn auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let public = is_public(&path);

    match resolve_user(&state, &req).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(CurrentUser(user));
        }
        Ok(None) => {
            if !public {
                return AppError::unauthorized("Authentication required").into_response();
            }
        }
        Err(err) => {
            if !public {
                return err.into_response();
            }
        }
    }

    next.run(req).await
}

/// Resolve the request's user. In auth-free mode everything runs as the
/// bootstrap default user; a misconfigured default is a 503. In standard
/// mode a valid, unexpired session token is required.
async fn resolve_user(state: &AppState, req: &Request) -> Result<Option<User>, AppError> {
    match state.settings.auth_mode().await {
        AuthMode::None => match crate::bootstrap::default_user(state).await? {
            Some(user) => Ok(Some(user)),
            None => Err(AppError::service_unavailable(
                "Auth-free mode is enabled but no default user is configured",
            )),
        },
        AuthMode::Standard => {
            let Some(token) = bearer_token(req) else {
                return Ok(None);
            };
            repo::sessions::validate(&state.pool, &token).await
        }
    }
}
