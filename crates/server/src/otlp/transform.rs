//! Transformation of normalized OTLP trees into flat persistence rows.
//! Processing order inside a batch is scope-then-record; entries that are
//! not objects (passed through by the normalizer) are skipped here.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};
use shared_types::{LogLevel, NewLog, NewSpan, SpanKindValue, SpanStatusCode, TraceAggregate};

/// Unwrap an OTLP value-wrapper object into plain JSON. Wrapper keys may
/// arrive in either camelCase or snake_case inside record bodies.
fn unwrap_any(value: &Value) -> Value {
    let Some(obj) = value.as_object() else {
        return value.clone();
    };

    let get = |camel: &str, snake: &str| obj.get(camel).or_else(|| obj.get(snake));

    if let Some(s) = get("stringValue", "string_value") {
        return s.clone();
    }
    if let Some(b) = get("boolValue", "bool_value") {
        return b.clone();
    }
    if let Some(i) = get("intValue", "int_value") {
        // OTLP JSON carries 64-bit ints as strings.
        if let Some(raw) = i.as_str() {
            if let Ok(n) = raw.parse::<i64>() {
                return Value::from(n);
            }
        }
        return i.clone();
    }
    if let Some(d) = get("doubleValue", "double_value") {
        return d.clone();
    }
    if let Some(arr) = get("arrayValue", "array_value") {
        let values = arr
            .get("values")
            .and_then(Value::as_array)
            .map(|vs| vs.iter().map(unwrap_any).collect())
            .unwrap_or_default();
        return Value::Array(values);
    }
    if let Some(kvs) = get("kvlistValue", "kvlist_value") {
        let mut map = Map::new();
        if let Some(values) = kvs.get("values").and_then(Value::as_array) {
            for entry in values {
                if let Some(key) = entry.get("key").and_then(Value::as_str) {
                    let val = entry.get("value").map(unwrap_any).unwrap_or(Value::Null);
                    map.insert(key.to_string(), val);
                }
            }
        }
        return Value::Object(map);
    }
    if let Some(b) = get("bytesValue", "bytes_value") {
        return b.clone();
    }

    value.clone()
}

/// Flatten an OTLP attribute list (`[{key, value}]`) into a JSON map.
fn attrs_to_map(value: Option<&Value>) -> Map<String, Value> {
    let mut map = Map::new();
    let Some(entries) = value.and_then(Value::as_array) else {
        return map;
    };
    for entry in entries {
        let Some(key) = entry.get("key").and_then(Value::as_str) else {
            continue;
        };
        let val = entry.get("value").map(unwrap_any).unwrap_or(Value::Null);
        map.insert(key.to_string(), val);
    }
    map
}

/// Parse a unix-nano timestamp (string or number). Zero means absent.
fn parse_unix_nano(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let nanos: i128 = match value? {
        Value::String(s) => s.parse().ok()?,
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i as i128
            } else {
                n.as_f64()? as i128
            }
        }
        _ => return None,
    };
    if nanos <= 0 {
        return None;
    }
    let secs = (nanos / 1_000_000_000) as i64;
    let subnanos = (nanos % 1_000_000_000) as u32;
    Utc.timestamp_opt(secs, subnanos).single()
}

/// Coerce a log body to a message string: a raw stringValue is used
/// directly, anything else is JSON-stringified whole.
fn body_to_message(body: Option<&Value>) -> String {
    let Some(body) = body else {
        return String::new();
    };
    if let Some(obj) = body.as_object() {
        if let Some(s) = obj
            .get("stringValue")
            .or_else(|| obj.get("string_value"))
            .and_then(Value::as_str)
        {
            return s.to_string();
        }
    }
    if body.is_null() {
        return String::new();
    }
    serde_json::to_string(body).unwrap_or_default()
}

fn severity_to_level(record: &Value) -> LogLevel {
    let number = match record.get("severityNumber") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        _ => None,
    };
    if let Some(n) = number {
        if n != 0 {
            return LogLevel::from_severity_number(n);
        }
    }
    match record.get("severityText").and_then(Value::as_str) {
        Some(text) if !text.is_empty() => LogLevel::from_str_or_default(text),
        _ => LogLevel::Info,
    }
}

fn id_field(value: &Value, key: &str) -> Option<String> {
    let raw = value.get(key)?.as_str()?;
    if raw.is_empty() {
        return None;
    }
    Some(raw.to_string())
}

fn is_zero_id(id: &str) -> bool {
    id.chars().all(|c| c == '0')
}

fn resource_service_name(resource_attrs: &Map<String, Value>) -> String {
    resource_attrs
        .get("service.name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| "unknown".to_string())
}

/// Transform a normalized logs export into persistence rows.
pub fn transform_logs(value: &Value) -> Vec<NewLog> {
    let mut out = Vec::new();
    let Some(resource_logs) = value.get("resourceLogs").and_then(Value::as_array) else {
        return out;
    };

    for rl in resource_logs {
        let Some(rl) = rl.as_object() else { continue };
        let resource_attrs = attrs_to_map(
            rl.get("resource").and_then(|r| r.get("attributes")),
        );
        let service = resource_service_name(&resource_attrs);

        let Some(scope_logs) = rl.get("scopeLogs").and_then(Value::as_array) else {
            continue;
        };
        for sl in scope_logs {
            let Some(records) = sl.get("logRecords").and_then(Value::as_array) else {
                continue;
            };
            for record in records {
                if !record.is_object() {
                    continue;
                }

                let time = parse_unix_nano(record.get("timeUnixNano"))
                    .or_else(|| parse_unix_nano(record.get("observedTimeUnixNano")))
                    .unwrap_or_else(Utc::now);

                let mut metadata = resource_attrs.clone();
                for (key, val) in attrs_to_map(record.get("attributes")) {
                    metadata.insert(key, val);
                }

                out.push(NewLog {
                    time,
                    service: service.clone(),
                    level: severity_to_level(record).as_str().to_string(),
                    message: body_to_message(record.get("body")),
                    metadata: Value::Object(metadata),
                    trace_id: id_field(record, "traceId"),
                    span_id: id_field(record, "spanId"),
                });
            }
        }
    }

    out
}

fn span_kind(value: &Value) -> SpanKindValue {
    match value.get("kind") {
        Some(Value::Number(n)) => SpanKindValue::from_otlp(n.as_i64().unwrap_or(0)),
        Some(Value::String(s)) => match s.trim_start_matches("SPAN_KIND_") {
            "SERVER" => SpanKindValue::Server,
            "CLIENT" => SpanKindValue::Client,
            "PRODUCER" => SpanKindValue::Producer,
            "CONSUMER" => SpanKindValue::Consumer,
            _ => SpanKindValue::Internal,
        },
        _ => SpanKindValue::Internal,
    }
}

fn span_status(value: &Value) -> (SpanStatusCode, Option<String>) {
    let Some(status) = value.get("status") else {
        return (SpanStatusCode::Unset, None);
    };
    let code = match status.get("code") {
        Some(Value::Number(n)) => SpanStatusCode::from_otlp(n.as_i64().unwrap_or(0)),
        Some(Value::String(s)) => match s.trim_start_matches("STATUS_CODE_") {
            "OK" => SpanStatusCode::Ok,
            "ERROR" => SpanStatusCode::Error,
            _ => SpanStatusCode::Unset,
        },
        _ => SpanStatusCode::Unset,
    };
    let message = status
        .get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    (code, message)
}

/// Transform a normalized traces export into span rows and per-trace
/// aggregates. Spans missing IDs (or carrying all-zero IDs) are skipped.
///
/// When multiple parentless spans share a trace within one batch, the
/// last one observed provides the root fields; the trace-level service
/// name is the first resource service seen for that trace.
pub fn transform_spans(value: &Value) -> (Vec<NewSpan>, Vec<TraceAggregate>) {
    let mut spans = Vec::new();
    let mut aggregates: HashMap<String, TraceAggregate> = HashMap::new();

    let Some(resource_spans) = value.get("resourceSpans").and_then(Value::as_array) else {
        return (spans, Vec::new());
    };

    for rs in resource_spans {
        let Some(rs) = rs.as_object() else { continue };
        let resource_attrs = attrs_to_map(
            rs.get("resource").and_then(|r| r.get("attributes")),
        );
        let service = resource_service_name(&resource_attrs);
        let resource_attrs_json = Value::Object(resource_attrs.clone());

        let Some(scope_spans) = rs.get("scopeSpans").and_then(Value::as_array) else {
            continue;
        };
        for ss in scope_spans {
            let Some(span_list) = ss.get("spans").and_then(Value::as_array) else {
                continue;
            };
            for span in span_list {
                if !span.is_object() {
                    continue;
                }
                let Some(trace_id) = id_field(span, "traceId") else {
                    continue;
                };
                let Some(span_id) = id_field(span, "spanId") else {
                    continue;
                };
                if is_zero_id(&trace_id) || is_zero_id(&span_id) {
                    continue;
                }

                let parent_span_id =
                    id_field(span, "parentSpanId").filter(|id| !is_zero_id(id));

                let start_time =
                    parse_unix_nano(span.get("startTimeUnixNano")).unwrap_or_else(Utc::now);
                let end_time =
                    parse_unix_nano(span.get("endTimeUnixNano")).unwrap_or(start_time);
                let duration_ms =
                    (end_time - start_time).num_microseconds().unwrap_or(0) as f64 / 1000.0;

                let operation_name = span
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let (status_code, status_message) = span_status(span);
                let attributes = Value::Object(attrs_to_map(span.get("attributes")));
                let events = span.get("events").cloned().unwrap_or_else(|| Value::Array(vec![]));
                let links = span.get("links").cloned().unwrap_or_else(|| Value::Array(vec![]));

                let is_error = status_code == SpanStatusCode::Error;
                let is_root = parent_span_id.is_none();

                let entry = aggregates
                    .entry(trace_id.clone())
                    .or_insert_with(|| TraceAggregate {
                        trace_id: trace_id.clone(),
                        service_name: service.clone(),
                        root_service_name: None,
                        root_operation_name: None,
                        start_time,
                        end_time,
                        duration_ms: 0.0,
                        span_count: 0,
                        error: false,
                    });
                entry.start_time = entry.start_time.min(start_time);
                entry.end_time = entry.end_time.max(end_time);
                entry.duration_ms = (entry.end_time - entry.start_time)
                    .num_microseconds()
                    .unwrap_or(0) as f64
                    / 1000.0;
                entry.span_count += 1;
                entry.error |= is_error;
                if is_root {
                    entry.root_service_name = Some(service.clone());
                    entry.root_operation_name = Some(operation_name.clone());
                }

                spans.push(NewSpan {
                    trace_id,
                    span_id,
                    parent_span_id,
                    service_name: service.clone(),
                    operation_name,
                    start_time,
                    end_time,
                    duration_ms,
                    kind: span_kind(span).as_str().to_string(),
                    status_code: status_code.as_str().to_string(),
                    status_message,
                    attributes,
                    events,
                    links,
                    resource_attributes: resource_attrs_json.clone(),
                });
            }
        }
    }

    let mut aggregates: Vec<TraceAggregate> = aggregates.into_values().collect();
    aggregates.sort_by(|a, b| a.trace_id.cmp(&b.trace_id));
    (spans, aggregates)
}
