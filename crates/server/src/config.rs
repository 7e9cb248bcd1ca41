//! Environment-driven configuration. Every knob is read through a helper
//! so defaults live in one place.

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

pub fn port() -> u16 {
    env_parse("PORT", 3000)
}

/// Base URL of the front-end, used for OIDC callback redirects.
pub fn frontend_url() -> String {
    std::env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string())
}

pub fn redis_url() -> Option<String> {
    std::env::var("REDIS_URL").ok().filter(|v| !v.is_empty())
}

/// Maximum accepted request body (compressed) for OTLP exports, in bytes.
pub fn otlp_max_body_bytes() -> usize {
    env_parse("OTLP_MAX_BODY_BYTES", 8 * 1024 * 1024)
}

/// Cap on the decompressed size of a gzip OTLP body, in bytes.
pub fn otlp_max_decompressed_bytes() -> u64 {
    env_parse("OTLP_MAX_DECOMPRESSED_BYTES", 32 * 1024 * 1024)
}

/// TTL for cached log-query results, in seconds.
pub fn query_cache_ttl_secs() -> u64 {
    env_parse("QUERY_CACHE_TTL_SECS", 30)
}

/// TTL for cached aggregation results and distinct-service lists.
pub fn stats_cache_ttl_secs() -> u64 {
    env_parse("STATS_CACHE_TTL_SECS", 60)
}

/// TTL for cached by-trace queries. Trace data is immutable once written,
/// so this is longer than the regular query TTL.
pub fn trace_cache_ttl_secs() -> u64 {
    env_parse("TRACE_CACHE_TTL_SECS", 300)
}

pub fn login_rate_limit_max() -> u32 {
    env_parse("LOGIN_RATE_LIMIT_MAX", 10)
}

pub fn login_rate_limit_window_secs() -> u64 {
    env_parse("LOGIN_RATE_LIMIT_WINDOW_SECS", 60)
}

/// Worker concurrency per background queue.
pub fn worker_concurrency() -> usize {
    env_parse("WORKER_CONCURRENCY", 2)
}

/// Maximum delivery attempts for a background job before it is dropped.
pub fn job_max_attempts() -> u32 {
    env_parse("JOB_MAX_ATTEMPTS", 3)
}

/// Alert evaluator tick interval, in seconds.
pub fn alert_eval_interval_secs() -> u64 {
    env_parse("ALERT_EVAL_INTERVAL_SECS", 60)
}
