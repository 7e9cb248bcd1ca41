//! Conversion of prost-decoded OTLP messages into the same canonical
//! JSON shape the normalizer produces for JSON bodies: camelCase keys,
//! lowercase-hex IDs, value-wrapper objects.

use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use opentelemetry_proto::tonic::common::v1::{any_value, AnyValue, InstrumentationScope, KeyValue};
use opentelemetry_proto::tonic::resource::v1::Resource;
use serde_json::{json, Value};

fn any_value_to_json(value: &AnyValue) -> Value {
    match &value.value {
        Some(any_value::Value::StringValue(s)) => json!({ "stringValue": s }),
        Some(any_value::Value::BoolValue(b)) => json!({ "boolValue": b }),
        Some(any_value::Value::IntValue(i)) => json!({ "intValue": i.to_string() }),
        Some(any_value::Value::DoubleValue(d)) => json!({ "doubleValue": d }),
        Some(any_value::Value::ArrayValue(arr)) => {
            let values: Vec<Value> = arr.values.iter().map(any_value_to_json).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Some(any_value::Value::KvlistValue(kvs)) => {
            json!({ "kvlistValue": { "values": kv_list_to_json(&kvs.values) } })
        }
        Some(any_value::Value::BytesValue(bytes)) => {
            use base64::engine::general_purpose::STANDARD as BASE64;
            use base64::Engine as _;
            json!({ "bytesValue": BASE64.encode(bytes) })
        }
        None => Value::Null,
    }
}

fn kv_list_to_json(attributes: &[KeyValue]) -> Value {
    Value::Array(
        attributes
            .iter()
            .map(|kv| {
                json!({
                    "key": kv.key,
                    "value": kv.value.as_ref().map(any_value_to_json).unwrap_or(Value::Null),
                })
            })
            .collect(),
    )
}

fn resource_to_json(resource: Option<&Resource>) -> Value {
    match resource {
        Some(r) => json!({
            "attributes": kv_list_to_json(&r.attributes),
            "droppedAttributesCount": r.dropped_attributes_count,
        }),
        None => json!({ "attributes": [] }),
    }
}

fn scope_to_json(scope: Option<&InstrumentationScope>) -> Value {
    match scope {
        Some(s) => json!({
            "name": s.name,
            "version": s.version,
            "attributes": kv_list_to_json(&s.attributes),
        }),
        None => Value::Null,
    }
}

fn id_to_json(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::String(String::new())
    } else {
        Value::String(hex::encode(bytes))
    }
}

pub fn logs_request_to_json(request: &ExportLogsServiceRequest) -> Value {
    let resource_logs: Vec<Value> = request
        .resource_logs
        .iter()
        .map(|rl| {
            let scope_logs: Vec<Value> = rl
                .scope_logs
                .iter()
                .map(|sl| {
                    let records: Vec<Value> = sl
                        .log_records
                        .iter()
                        .map(|r| {
                            json!({
                                "timeUnixNano": r.time_unix_nano.to_string(),
                                "observedTimeUnixNano": r.observed_time_unix_nano.to_string(),
                                "severityNumber": r.severity_number,
                                "severityText": r.severity_text,
                                "body": r.body.as_ref().map(any_value_to_json).unwrap_or(Value::Null),
                                "attributes": kv_list_to_json(&r.attributes),
                                "droppedAttributesCount": r.dropped_attributes_count,
                                "traceId": id_to_json(&r.trace_id),
                                "spanId": id_to_json(&r.span_id),
                            })
                        })
                        .collect();
                    json!({
                        "scope": scope_to_json(sl.scope.as_ref()),
                        "logRecords": records,
                        "schemaUrl": sl.schema_url,
                    })
                })
                .collect();
            json!({
                "resource": resource_to_json(rl.resource.as_ref()),
                "scopeLogs": scope_logs,
                "schemaUrl": rl.schema_url,
            })
        })
        .collect();

    json!({ "resourceLogs": resource_logs })
}

pub fn traces_request_to_json(request: &ExportTraceServiceRequest) -> Value {
    let resource_spans: Vec<Value> = request
        .resource_spans
        .iter()
        .map(|rs| {
            let scope_spans: Vec<Value> = rs
                .scope_spans
                .iter()
                .map(|ss| {
                    let spans: Vec<Value> = ss
                        .spans
                        .iter()
                        .map(|s| {
                            let events: Vec<Value> = s
                                .events
                                .iter()
                                .map(|e| {
                                    json!({
                                        "timeUnixNano": e.time_unix_nano.to_string(),
                                        "name": e.name,
                                        "attributes": kv_list_to_json(&e.attributes),
                                    })
                                })
                                .collect();
                            let links: Vec<Value> = s
                                .links
                                .iter()
                                .map(|l| {
                                    json!({
                                        "traceId": id_to_json(&l.trace_id),
                                        "spanId": id_to_json(&l.span_id),
                                        "attributes": kv_list_to_json(&l.attributes),
                                    })
                                })
                                .collect();
                            json!({
                                "traceId": id_to_json(&s.trace_id),
                                "spanId": id_to_json(&s.span_id),
                                "parentSpanId": id_to_json(&s.parent_span_id),
                                "traceState": s.trace_state,
                                "name": s.name,
                                "kind": s.kind,
                                "startTimeUnixNano": s.start_time_unix_nano.to_string(),
                                "endTimeUnixNano": s.end_time_unix_nano.to_string(),
                                "attributes": kv_list_to_json(&s.attributes),
                                "events": events,
                                "links": links,
                                "status": s.status.as_ref().map(|st| json!({
                                    "code": st.code,
                                    "message": st.message,
                                })).unwrap_or(Value::Null),
                            })
                        })
                        .collect();
                    json!({
                        "scope": scope_to_json(ss.scope.as_ref()),
                        "spans": spans,
                        "schemaUrl": ss.schema_url,
                    })
                })
                .collect();
            json!({
                "resource": resource_to_json(rs.resource.as_ref()),
                "scopeSpans": scope_spans,
                "schemaUrl": rs.schema_url,
            })
        })
        .collect();

    json!({ "resourceSpans": resource_spans })
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry_proto::tonic::trace::v1::{span, ResourceSpans, ScopeSpans, Span, Status};

    #[test]
    fn any_value_wrappers() {
        let string = AnyValue {
            value: Some(any_value::Value::StringValue("x".into())),
        };
        assert_eq!(any_value_to_json(&string)["stringValue"], "x");

        let int = AnyValue {
            value: Some(any_value::Value::IntValue(42)),
        };
        // OTLP JSON encodes 64-bit ints as strings.
        assert_eq!(any_value_to_json(&int)["intValue"], "42");

        let boolean = AnyValue {
            value: Some(any_value::Value::BoolValue(true)),
        };
        assert_eq!(any_value_to_json(&boolean)["boolValue"], true);
    }

    #[test]
    fn span_ids_hex_encoded() {
        let request = ExportTraceServiceRequest {
            resource_spans: vec![ResourceSpans {
                scope_spans: vec![ScopeSpans {
                    spans: vec![Span {
                        trace_id: vec![0x01; 16],
                        span_id: vec![0x02; 8],
                        parent_span_id: vec![],
                        name: "call".into(),
                        kind: span::SpanKind::Server as i32,
                        start_time_unix_nano: 1,
                        end_time_unix_nano: 2,
                        status: Some(Status {
                            code: 2,
                            message: "broke".into(),
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
        };

        let value = traces_request_to_json(&request);
        let span = &value["resourceSpans"][0]["scopeSpans"][0]["spans"][0];
        assert_eq!(span["traceId"], "01".repeat(16));
        assert_eq!(span["spanId"], "02".repeat(8));
        assert_eq!(span["parentSpanId"], "");
        assert_eq!(span["kind"], 2);
        assert_eq!(span["status"]["code"], 2);
        assert_eq!(span["status"]["message"], "broke");
    }
}
