use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Threshold alert rule evaluated periodically over a sliding time window.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct AlertRule {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub service: Option<String>,
    pub levels: Vec<String>,
    pub time_window_minutes: i32,
    pub threshold: i64,
    pub enabled: bool,
    pub email_recipients: Vec<String>,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Notification record; also the idempotency marker that suppresses
/// duplicate alerts within a rule's window.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct AlertHistory {
    pub id: Uuid,
    pub alert_rule_id: Uuid,
    pub triggered_at: DateTime<Utc>,
    pub log_count: i64,
    pub notified: bool,
    pub error: Option<String>,
}

/// Payload of an alert notification job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertNotificationJob {
    pub history_id: Uuid,
    pub rule_id: Uuid,
    pub rule_name: String,
    pub organization_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    pub log_count: i64,
    pub threshold: i64,
    pub time_window: i32,
    pub email_recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}

/// Body POSTed to a rule's webhook URL when an alert fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertWebhookPayload {
    pub alert_name: String,
    pub log_count: i64,
    pub threshold: i64,
    pub time_window: i32,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
}
