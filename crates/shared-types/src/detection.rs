use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sigma detection rule row. `detection` holds the selection maps and the
/// condition expression as stored JSON; `logsource` is kept for provenance.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct SigmaRule {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub project_id: Option<Uuid>,
    pub sigma_id: String,
    pub title: String,
    pub level: String,
    pub status: String,
    pub enabled: bool,
    #[schema(value_type = Object)]
    pub logsource: serde_json::Value,
    #[schema(value_type = Object)]
    pub detection: serde_json::Value,
    pub email_recipients: Vec<String>,
    pub webhook_url: Option<String>,
    pub alert_rule_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub conversion_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// One event inside a detection job, the flattened shape the rule engine
/// matches against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionEvent {
    pub message: String,
    pub level: String,
    pub service: String,
    pub time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Payload of a detection job: one batch of ingested logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionJob {
    pub logs: Vec<DetectionEvent>,
    pub organization_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
}

/// A rule that matched a particular log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleMatch {
    pub sigma_rule_id: Uuid,
    pub rule_title: String,
    pub rule_level: String,
    pub matched_at: DateTime<Utc>,
}

/// Per-log match result emitted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogMatches {
    pub log_index: usize,
    pub matched_rules: Vec<RuleMatch>,
}

/// Notification job enqueued when a Sigma rule with recipients matched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigmaNotificationJob {
    pub sigma_rule_id: Uuid,
    pub rule_title: String,
    pub rule_level: String,
    pub organization_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Uuid>,
    pub match_count: usize,
    pub first_seen: DateTime<Utc>,
    pub email_recipients: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,
}
