pub mod admin_providers;
pub mod admin_settings;
pub mod alerts;
pub mod auth;
pub mod live;
pub mod logs;
pub mod notifications;
pub mod otlp;
pub mod siem;
pub mod stats;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::{middleware, Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::AppState;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    use utoipa::OpenApi as _;
    Json(crate::openapi::ApiDoc::openapi())
}

/// Build the full application router.
pub fn api_router(state: AppState) -> Router {
    // Login and authorize sit behind the login rate limiter.
    let rate_limited = Router::new()
        .route("/api/v1/auth/providers/{slug}/login", post(auth::login))
        .route(
            "/api/v1/auth/providers/{slug}/authorize",
            get(auth::authorize),
        )
        .route_layer(middleware::from_fn_with_state(
            state.login_limiter.clone(),
            crate::rate_limit::login_rate_limit_middleware,
        ));

    Router::new()
        .route("/health", get(crate::health::health_check))
        // OTLP ingestion (API-key authenticated)
        .route(
            "/v1/otlp/logs",
            post(otlp::ingest_logs).get(otlp::logs_health),
        )
        .route(
            "/v1/otlp/traces",
            post(otlp::ingest_traces).get(otlp::traces_health),
        )
        // Auth
        .merge(rate_limited)
        .route("/api/v1/auth/providers", get(auth::list_providers))
        .route(
            "/api/v1/auth/providers/{slug}/callback",
            get(auth::callback),
        )
        .route("/api/v1/auth/config", get(auth::auth_config))
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/auth/logout", post(auth::logout))
        .route("/api/v1/auth/identities", get(auth::list_identities))
        .route("/api/v1/auth/identities/link", post(auth::link_identity))
        .route("/api/v1/auth/identities/{id}", delete(auth::unlink_identity))
        // Query engine
        .route("/api/v1/logs", get(logs::query_logs))
        .route("/api/v1/logs/context", get(logs::log_context))
        .route("/api/v1/logs/services", get(logs::distinct_services))
        .route("/api/v1/logs/tail", get(live::tail_logs))
        .route("/api/v1/logs/trace/{trace_id}", get(logs::logs_by_trace))
        .route("/api/v1/logs/stats", get(stats::level_histogram))
        .route("/api/v1/logs/stats/services", get(stats::top_services))
        .route("/api/v1/logs/stats/errors", get(stats::top_errors))
        // SIEM event stream
        .route("/api/v1/siem/events", get(siem::siem_events))
        // Alerts
        .route(
            "/api/v1/alerts/rules",
            get(alerts::list_rules).post(alerts::create_rule),
        )
        .route(
            "/api/v1/alerts/rules/{id}",
            put(alerts::update_rule).delete(alerts::delete_rule),
        )
        // Notifications
        .route(
            "/api/v1/notifications",
            get(notifications::list_notifications),
        )
        .route(
            "/api/v1/notifications/{id}/read",
            post(notifications::mark_read),
        )
        // Admin: providers
        .route(
            "/api/v1/admin/auth/providers",
            get(admin_providers::list_providers).post(admin_providers::create_provider),
        )
        .route(
            "/api/v1/admin/auth/providers/reorder",
            put(admin_providers::reorder_providers),
        )
        .route(
            "/api/v1/admin/auth/providers/{id}",
            get(admin_providers::get_provider)
                .put(admin_providers::update_provider)
                .delete(admin_providers::delete_provider),
        )
        .route(
            "/api/v1/admin/auth/providers/{id}/test",
            post(admin_providers::test_provider),
        )
        // Admin: settings
        .route(
            "/api/v1/admin/settings",
            get(admin_settings::list_settings).patch(admin_settings::patch_settings),
        )
        .route(
            "/api/v1/admin/settings/{key}",
            get(admin_settings::get_setting)
                .put(admin_settings::put_setting)
                .delete(admin_settings::delete_setting),
        )
        .route("/api/v1/openapi.json", get(openapi_json))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::auth::middleware::auth_middleware,
        ))
        .layer(DefaultBodyLimit::max(crate::config::otlp_max_body_bytes()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
