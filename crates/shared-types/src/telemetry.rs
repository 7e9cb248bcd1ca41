use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Log severity level. Stored lowercase in the database.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    /// Map an OTLP severity number to a level band:
    /// 1–8 debug, 9–12 info, 13–16 warn, 17–20 error, 21–24 critical.
    /// 0 (UNSPECIFIED) and out-of-range values fall back to info.
    pub fn from_severity_number(n: i64) -> Self {
        match n {
            1..=8 => LogLevel::Debug,
            9..=12 => LogLevel::Info,
            13..=16 => LogLevel::Warn,
            17..=20 => LogLevel::Error,
            21..=24 => LogLevel::Critical,
            _ => LogLevel::Info,
        }
    }

    pub fn from_str_or_default(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" | "warning" => LogLevel::Warn,
            "error" => LogLevel::Error,
            "critical" | "fatal" => LogLevel::Critical,
            _ => LogLevel::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    /// True when `s` is one of the five recognized level strings.
    pub fn is_valid(s: &str) -> bool {
        matches!(s, "debug" | "info" | "warn" | "error" | "critical")
    }
}

/// Persisted log row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct LogRecord {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub project_id: Uuid,
    pub service: String,
    pub level: String,
    pub message: String,
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

/// A log row produced by the transformer, before insertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewLog {
    pub time: DateTime<Utc>,
    pub service: String,
    pub level: String,
    pub message: String,
    pub metadata: serde_json::Value,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

/// OTLP span kind. Stored as the OTLP enum name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SpanKindValue {
    #[default]
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
}

impl SpanKindValue {
    pub fn from_otlp(n: i64) -> Self {
        match n {
            2 => SpanKindValue::Server,
            3 => SpanKindValue::Client,
            4 => SpanKindValue::Producer,
            5 => SpanKindValue::Consumer,
            _ => SpanKindValue::Internal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpanKindValue::Internal => "INTERNAL",
            SpanKindValue::Server => "SERVER",
            SpanKindValue::Client => "CLIENT",
            SpanKindValue::Producer => "PRODUCER",
            SpanKindValue::Consumer => "CONSUMER",
        }
    }
}

/// OTLP span status code.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum SpanStatusCode {
    #[default]
    Unset,
    Ok,
    Error,
}

impl SpanStatusCode {
    pub fn from_otlp(n: i64) -> Self {
        match n {
            1 => SpanStatusCode::Ok,
            2 => SpanStatusCode::Error,
            _ => SpanStatusCode::Unset,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpanStatusCode::Unset => "UNSET",
            SpanStatusCode::Ok => "OK",
            SpanStatusCode::Error => "ERROR",
        }
    }
}

/// Persisted span row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct SpanRecord {
    pub id: Uuid,
    pub time: DateTime<Utc>,
    pub project_id: Uuid,
    pub organization_id: Uuid,
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub service_name: String,
    pub operation_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub kind: String,
    pub status_code: String,
    pub status_message: Option<String>,
    #[schema(value_type = Object)]
    pub attributes: serde_json::Value,
    #[schema(value_type = Object)]
    pub events: serde_json::Value,
    #[schema(value_type = Object)]
    pub links: serde_json::Value,
    #[schema(value_type = Object)]
    pub resource_attributes: serde_json::Value,
}

/// A span row produced by the transformer, before insertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_span_id: Option<String>,
    pub service_name: String,
    pub operation_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub kind: String,
    pub status_code: String,
    pub status_message: Option<String>,
    pub attributes: serde_json::Value,
    pub events: serde_json::Value,
    pub links: serde_json::Value,
    pub resource_attributes: serde_json::Value,
}

/// Materialized per-trace aggregate, upserted once per ingest batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraceAggregate {
    pub trace_id: String,
    pub service_name: String,
    pub root_service_name: Option<String>,
    pub root_operation_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub span_count: i64,
    pub error: bool,
}

/// Persisted trace summary row.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, utoipa::ToSchema)]
pub struct TraceSummary {
    pub project_id: Uuid,
    pub trace_id: String,
    pub service_name: String,
    pub root_service_name: Option<String>,
    pub root_operation_name: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub span_count: i64,
    pub error: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_bands_cover_1_through_24() {
        for n in 1..=24i64 {
            let level = LogLevel::from_severity_number(n);
            let expected = match n {
                1..=8 => LogLevel::Debug,
                9..=12 => LogLevel::Info,
                13..=16 => LogLevel::Warn,
                17..=20 => LogLevel::Error,
                _ => LogLevel::Critical,
            };
            assert_eq!(level, expected, "severity {n}");
        }
    }

    #[test]
    fn severity_zero_and_out_of_range_default_to_info() {
        assert_eq!(LogLevel::from_severity_number(0), LogLevel::Info);
        assert_eq!(LogLevel::from_severity_number(25), LogLevel::Info);
        assert_eq!(LogLevel::from_severity_number(-3), LogLevel::Info);
    }

    #[test]
    fn span_kind_mapping() {
        assert_eq!(SpanKindValue::from_otlp(2).as_str(), "SERVER");
        assert_eq!(SpanKindValue::from_otlp(0).as_str(), "INTERNAL");
        assert_eq!(SpanKindValue::from_otlp(99).as_str(), "INTERNAL");
    }

    #[test]
    fn span_status_mapping() {
        assert_eq!(SpanStatusCode::from_otlp(2), SpanStatusCode::Error);
        assert_eq!(SpanStatusCode::from_otlp(1), SpanStatusCode::Ok);
        assert_eq!(SpanStatusCode::from_otlp(0), SpanStatusCode::Unset);
    }

    #[test]
    fn level_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&LogLevel::Critical).unwrap(),
            "\"critical\""
        );
    }
}
