use utoipa::OpenApi;

/// OpenAPI document served at `/api/v1/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Log & Trace Platform API",
        description = "Multi-tenant log and distributed-trace ingestion and query platform"
    ),
    paths(
        crate::health::health_check,
        crate::rest::otlp::ingest_logs,
        crate::rest::otlp::ingest_traces,
        crate::rest::otlp::logs_health,
        crate::rest::otlp::traces_health,
        crate::rest::logs::query_logs,
        crate::rest::logs::log_context,
        crate::rest::logs::logs_by_trace,
        crate::rest::logs::distinct_services,
        crate::rest::stats::level_histogram,
        crate::rest::stats::top_services,
        crate::rest::stats::top_errors,
        crate::rest::auth::list_providers,
        crate::rest::auth::authorize,
        crate::rest::auth::callback,
        crate::rest::auth::login,
        crate::rest::auth::auth_config,
        crate::rest::auth::me,
        crate::rest::auth::logout,
        crate::rest::auth::list_identities,
        crate::rest::auth::link_identity,
        crate::rest::auth::unlink_identity,
        crate::rest::admin_providers::list_providers,
        crate::rest::admin_providers::get_provider,
        crate::rest::admin_providers::create_provider,
        crate::rest::admin_providers::update_provider,
        crate::rest::admin_providers::delete_provider,
        crate::rest::admin_providers::reorder_providers,
        crate::rest::admin_providers::test_provider,
        crate::rest::admin_settings::list_settings,
        crate::rest::admin_settings::get_setting,
        crate::rest::admin_settings::put_setting,
        crate::rest::admin_settings::patch_settings,
        crate::rest::admin_settings::delete_setting,
        crate::rest::alerts::list_rules,
        crate::rest::alerts::create_rule,
        crate::rest::alerts::update_rule,
        crate::rest::alerts::delete_rule,
        crate::rest::notifications::list_notifications,
        crate::rest::notifications::mark_read,
    ),
    components(schemas(
        shared_types::AppError,
        shared_types::AppErrorKind,
        shared_types::LogRecord,
        shared_types::LogQueryResponse,
        shared_types::LogContextResponse,
        shared_types::LevelBucket,
        shared_types::ServiceCount,
        shared_types::MessageCount,
        shared_types::LogsExportResponse,
        shared_types::LogsPartialSuccess,
        shared_types::TracesExportResponse,
        shared_types::TracesPartialSuccess,
        shared_types::ProviderPublic,
        shared_types::AuthorizeResponse,
        shared_types::LoginRequest,
        shared_types::LoginResponse,
        shared_types::UserInfo,
        shared_types::SessionInfo,
        shared_types::AuthConfigResponse,
        shared_types::AuthProvider,
        shared_types::UserIdentity,
        shared_types::CreateProviderRequest,
        shared_types::UpdateProviderRequest,
        shared_types::ReorderProvidersRequest,
        shared_types::TestProviderResponse,
        shared_types::LinkIdentityRequest,
        shared_types::SettingUpdateRequest,
        shared_types::SystemSetting,
        shared_types::AlertRule,
        shared_types::CreateAlertRuleRequest,
        shared_types::UpdateAlertRuleRequest,
        shared_types::Notification,
        crate::health::HealthResponse,
    ))
)]
pub struct ApiDoc;
