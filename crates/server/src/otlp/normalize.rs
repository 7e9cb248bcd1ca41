use serde_json::Value;

/// Known snake_case → camelCase key renames. Unknown keys pass through
/// untouched so vendor extensions survive normalization.
const KEY_RENAMES: &[(&str, &str)] = &[
    ("resource_logs", "resourceLogs"),
    ("scope_logs", "scopeLogs"),
    ("log_records", "logRecords"),
    ("time_unix_nano", "timeUnixNano"),
    ("observed_time_unix_nano", "observedTimeUnixNano"),
    ("severity_number", "severityNumber"),
    ("severity_text", "severityText"),
    ("trace_id", "traceId"),
    ("span_id", "spanId"),
    ("parent_span_id", "parentSpanId"),
    ("trace_state", "traceState"),
    ("start_time_unix_nano", "startTimeUnixNano"),
    ("end_time_unix_nano", "endTimeUnixNano"),
    ("schema_url", "schemaUrl"),
    ("dropped_attributes_count", "droppedAttributesCount"),
    ("resource_spans", "resourceSpans"),
    ("scope_spans", "scopeSpans"),
];

fn rename_for(key: &str) -> Option<&'static str> {
    KEY_RENAMES
        .iter()
        .find(|(snake, _)| *snake == key)
        .map(|(_, camel)| *camel)
}

fn is_id_key(key: &str) -> bool {
    matches!(key, "traceId" | "spanId" | "parentSpanId")
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Normalize a trace/span identifier: 16- or 32-hex values are kept
/// (lowercased); base64 values of the correct decoded length (8 or 16
/// bytes) are converted to lowercase hex; anything else passes through.
pub fn normalize_id(raw: &str) -> String {
    if is_hex(raw) && (raw.len() == 16 || raw.len() == 32) {
        return raw.to_lowercase();
    }
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    if let Ok(bytes) = BASE64.decode(raw) {
        if bytes.len() == 8 || bytes.len() == 16 {
            return hex::encode(bytes);
        }
    }
    raw.to_string()
}

/// Recursively normalize an OTLP JSON tree: rename the known snake_case
/// keys to camelCase and convert base64 IDs to hex. Idempotent. When both
/// a snake key and its camelCase counterpart are present, the camelCase
/// value wins and the snake duplicate is dropped.
pub fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let original_keys: std::collections::HashSet<String> = map.keys().cloned().collect();
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, val) in map {
                let target = match rename_for(&key) {
                    // Drop the snake duplicate when the camelCase key is
                    // also present in the source object.
                    Some(camel) if original_keys.contains(camel) => continue,
                    Some(camel) => camel.to_string(),
                    None => key,
                };
                if out.contains_key(&target) {
                    continue;
                }
                let val = normalize(val);
                let val = if is_id_key(&target) {
                    match val {
                        Value::String(s) => Value::String(normalize_id(&s)),
                        other => other,
                    }
                } else {
                    val
                };
                out.insert(target, val);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renames_known_snake_keys() {
        let input = json!({
            "resource_logs": [{
                "scope_logs": [{
                    "log_records": [{
                        "time_unix_nano": "123",
                        "severity_number": 9,
                        "severity_text": "INFO"
                    }]
                }]
            }]
        });
        let out = normalize(input);
        let record = &out["resourceLogs"][0]["scopeLogs"][0]["logRecords"][0];
        assert_eq!(record["timeUnixNano"], "123");
        assert_eq!(record["severityNumber"], 9);
        assert_eq!(record["severityText"], "INFO");
    }

    #[test]
    fn preserves_unknown_keys() {
        let out = normalize(json!({"vendor_extension": {"trace_flags": 1}, "x": 2}));
        assert_eq!(out["vendor_extension"]["trace_flags"], 1);
        assert_eq!(out["x"], 2);
    }

    #[test]
    fn is_idempotent() {
        let input = json!({
            "resource_spans": [{
                "scope_spans": [{
                    "spans": [{
                        "trace_id": "qqqqqqqqqqqqqqqqqqqqqg==",
                        "span_id": "zc3Nzc3Nzc0=",
                        "start_time_unix_nano": "1",
                        "custom_field": true
                    }]
                }]
            }]
        });
        let once = normalize(input.clone());
        let twice = normalize(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn hex_ids_kept_and_lowercased() {
        assert_eq!(normalize_id("DEADBEEFDEADBEEF"), "deadbeefdeadbeef");
        let hex32 = "AB".repeat(16);
        assert_eq!(normalize_id(&hex32), "ab".repeat(16));
    }

    #[test]
    fn base64_ids_converted_to_hex() {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine as _;
        let trace = BASE64.encode([0xAAu8; 16]);
        assert_eq!(normalize_id(&trace), "aa".repeat(16));
        let span = BASE64.encode([0xCDu8; 8]);
        assert_eq!(normalize_id(&span), "cd".repeat(8));
    }

    #[test]
    fn wrong_length_base64_passes_through() {
        use base64::engine::general_purpose::STANDARD as BASE64;
        use base64::Engine as _;
        let odd = BASE64.encode([1u8; 5]);
        assert_eq!(normalize_id(&odd), odd);
    }

    #[test]
    fn camel_counterpart_wins_over_snake_duplicate() {
        let out = normalize(json!({"traceId": "aa".repeat(16), "trace_id": "bb".repeat(16)}));
        assert_eq!(out["traceId"], "aa".repeat(16));
        assert!(out.get("trace_id").is_none());
    }

    #[test]
    fn invalid_array_entries_pass_through() {
        let out = normalize(json!({"resource_logs": [42, "bogus", {"scope_logs": []}]}));
        assert_eq!(out["resourceLogs"][0], 42);
        assert_eq!(out["resourceLogs"][1], "bogus");
        assert!(out["resourceLogs"][2]["scopeLogs"].is_array());
    }

    #[test]
    fn body_value_wrappers_left_as_observed() {
        let out = normalize(json!({"body": {"string_value": "hi"}}));
        // Wrapper keys inside the body are not in the rename table.
        assert_eq!(out["body"]["string_value"], "hi");
    }
}
