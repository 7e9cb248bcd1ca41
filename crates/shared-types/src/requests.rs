use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{LogRecord, User};

// ---------------------------------------------------------------------------
// OTLP export responses
// ---------------------------------------------------------------------------

/// OTLP/HTTP partial-success body for a logs export.
#[derive(Debug, Clone, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogsPartialSuccess {
    pub rejected_log_records: i64,
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogsExportResponse {
    pub partial_success: LogsPartialSuccess,
}

/// OTLP/HTTP partial-success body for a traces export.
#[derive(Debug, Clone, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TracesPartialSuccess {
    pub rejected_spans: i64,
    pub error_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TracesExportResponse {
    pub partial_success: TracesPartialSuccess,
}

// ---------------------------------------------------------------------------
// Log queries
// ---------------------------------------------------------------------------

/// Query-string parameters for the logs search endpoint. Multi-value
/// filters (`projects`, `services`, `levels`) are comma-separated.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct LogQueryParams {
    pub projects: Option<String>,
    pub services: Option<String>,
    pub levels: Option<String>,
    pub trace_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Full-text search term matched against `message`.
    pub q: Option<String>,
    pub cursor: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LogQueryResponse {
    pub logs: Vec<LogRecord>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct LogContextParams {
    pub project_id: Uuid,
    pub time: DateTime<Utc>,
    pub log_id: Option<Uuid>,
    pub before: Option<i64>,
    pub after: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LogContextResponse {
    pub before: Vec<LogRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<LogRecord>,
    pub after: Vec<LogRecord>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct TraceLogsParams {
    pub project_id: Uuid,
}

// ---------------------------------------------------------------------------
// Aggregations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct LogStatsParams {
    pub projects: Option<String>,
    pub services: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    /// Bucket interval: one of `1m`, `5m`, `1h`, `1d`.
    pub interval: Option<String>,
}

/// One time bucket of the level histogram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, utoipa::ToSchema)]
pub struct LevelBucket {
    pub bucket: DateTime<Utc>,
    pub total: i64,
    pub by_level: std::collections::HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ServiceCount {
    pub service: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct MessageCount {
    pub message: String,
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct TopNParams {
    pub projects: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub n: Option<i64>,
}

// ---------------------------------------------------------------------------
// Live tail
// ---------------------------------------------------------------------------

/// Frame sent to live-tail subscribers over WebSocket and SSE.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TailFrame {
    Log { log: LogRecord },
    /// Emitted when a slow subscriber fell behind and `count` events
    /// were discarded.
    Dropped { count: u64 },
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct TailParams {
    pub project_id: Uuid,
    pub service: Option<String>,
    pub level: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SiemEventsParams {
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub incident_id: Option<Uuid>,
    pub token: Option<String>,
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Public listing entry for an enabled provider.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProviderPublic {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub is_default: bool,
    pub display_order: i32,
    pub supports_redirect: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AuthorizeResponse {
    pub url: String,
    pub state: String,
    pub provider: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
}

impl From<&User> for UserInfo {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            display_name: user.display_name.clone(),
            is_admin: user.is_admin,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: UserInfo,
    pub session: SessionInfo,
    pub is_new_user: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfigResponse {
    pub auth_mode: String,
    pub signup_enabled: bool,
    pub requires_login: bool,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct AuthorizeParams {
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct LinkIdentityRequest {
    pub provider_slug: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

// ---------------------------------------------------------------------------
// Admin: providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProviderRequest {
    pub kind: String,
    pub slug: String,
    pub name: String,
    pub icon: Option<String>,
    pub enabled: Option<bool>,
    pub is_default: Option<bool>,
    pub display_order: Option<i32>,
    pub allow_auto_register: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProviderRequest {
    pub name: Option<String>,
    pub icon: Option<String>,
    pub enabled: Option<bool>,
    pub is_default: Option<bool>,
    pub display_order: Option<i32>,
    pub allow_auto_register: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub config: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct ReorderProvidersRequest {
    /// Provider ids in the desired display order.
    pub ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TestProviderResponse {
    pub success: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Admin: settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct SettingUpdateRequest {
    #[schema(value_type = Object)]
    pub value: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Alert rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAlertRuleRequest {
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub service: Option<String>,
    pub levels: Vec<String>,
    pub time_window_minutes: i32,
    pub threshold: i64,
    pub enabled: Option<bool>,
    pub email_recipients: Option<Vec<String>>,
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAlertRuleRequest {
    pub name: Option<String>,
    pub service: Option<String>,
    pub levels: Option<Vec<String>>,
    pub time_window_minutes: Option<i32>,
    pub threshold: Option<i64>,
    pub enabled: Option<bool>,
    pub email_recipients: Option<Vec<String>>,
    pub webhook_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_frame_serializes_with_type_tag() {
        let frame = TailFrame::Dropped { count: 7 };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "dropped");
        assert_eq!(json["count"], 7);
    }

    #[test]
    fn logs_export_response_uses_otlp_field_names() {
        let resp = LogsExportResponse {
            partial_success: LogsPartialSuccess {
                rejected_log_records: 3,
                error_message: "db error".to_string(),
            },
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["partialSuccess"]["rejectedLogRecords"], 3);
        assert_eq!(json["partialSuccess"]["errorMessage"], "db error");
    }

    #[test]
    fn provider_public_renames_kind_to_type() {
        let p = ProviderPublic {
            id: Uuid::nil(),
            kind: "oidc".to_string(),
            name: "Okta".to_string(),
            slug: "okta".to_string(),
            icon: None,
            is_default: true,
            display_order: 0,
            supports_redirect: true,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["type"], "oidc");
        assert_eq!(json["isDefault"], true);
        assert_eq!(json["supportsRedirect"], true);
    }
}
