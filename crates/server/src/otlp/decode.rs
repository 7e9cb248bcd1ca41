use std::fmt;
use std::io::Read;

use flate2::read::GzDecoder;
use opentelemetry_proto::tonic::collector::logs::v1::ExportLogsServiceRequest;
use opentelemetry_proto::tonic::collector::trace::v1::ExportTraceServiceRequest;
use prost::Message;

use super::{normalize, proto};

/// Gzip magic bytes. Some collectors compress without setting
/// `Content-Encoding`, so detection goes by content, not header.
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError(pub String);

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentKind {
    Json,
    Protobuf,
}

/// Explicit content type wins; anything unknown falls back to JSON.
fn content_kind(content_type: Option<&str>) -> ContentKind {
    match content_type {
        Some(ct) if ct.contains("protobuf") => ContentKind::Protobuf,
        _ => ContentKind::Json,
    }
}

/// Decompress when the body starts with the gzip magic, capped at
/// `max_decompressed` bytes. Non-gzip bodies pass through untouched.
fn maybe_gunzip(body: &[u8], max_decompressed: u64) -> Result<Vec<u8>, DecodeError> {
    if body.len() < 2 || body[..2] != GZIP_MAGIC {
        return Ok(body.to_vec());
    }

    let mut out = Vec::new();
    let mut decoder = GzDecoder::new(body).take(max_decompressed + 1);
    decoder
        .read_to_end(&mut out)
        .map_err(|e| DecodeError(format!("failed to decompress gzip body: {e}")))?;

    if out.len() as u64 > max_decompressed {
        return Err(DecodeError("decompressed body exceeds size limit".to_string()));
    }
    Ok(out)
}

fn parse_json(body: &[u8]) -> Result<serde_json::Value, DecodeError> {
    let value: serde_json::Value = serde_json::from_slice(body)
        .map_err(|e| DecodeError(format!("invalid JSON body: {e}")))?;
    if !value.is_object() {
        return Err(DecodeError("invalid body type".to_string()));
    }
    Ok(normalize::normalize(value))
}

/// Decode an OTLP logs export body into the canonical normalized JSON tree.
pub fn decode_logs_body(
    body: &[u8],
    content_type: Option<&str>,
) -> Result<serde_json::Value, DecodeError> {
    let body = maybe_gunzip(body, crate::config::otlp_max_decompressed_bytes())?;

    match content_kind(content_type) {
        ContentKind::Json => parse_json(&body),
        ContentKind::Protobuf => match ExportLogsServiceRequest::decode(body.as_slice()) {
            Ok(request) => Ok(proto::logs_request_to_json(&request)),
            // Some SDKs send JSON under a protobuf content type; accept
            // valid UTF-8 JSON before giving up.
            Err(_) => match std::str::from_utf8(&body).ok().map(|s| parse_json(s.as_bytes())) {
                Some(Ok(value)) => Ok(value),
                _ => Err(DecodeError("failed to decode OTLP protobuf".to_string())),
            },
        },
    }
}

/// Decode an OTLP traces export body into the canonical normalized JSON tree.
pub fn decode_traces_body(
    body: &[u8],
    content_type: Option<&str>,
) -> Result<serde_json::Value, DecodeError> {
    let body = maybe_gunzip(body, crate::config::otlp_max_decompressed_bytes())?;

    match content_kind(content_type) {
        ContentKind::Json => parse_json(&body),
        ContentKind::Protobuf => match ExportTraceServiceRequest::decode(body.as_slice()) {
            Ok(request) => Ok(proto::traces_request_to_json(&request)),
            Err(_) => match std::str::from_utf8(&body).ok().map(|s| parse_json(s.as_bytes())) {
                Some(Ok(value)) => Ok(value),
                _ => Err(DecodeError("failed to decode OTLP protobuf".to_string())),
            },
        },
    }
}
