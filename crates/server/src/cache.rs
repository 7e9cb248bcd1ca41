use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use uuid::Uuid;

/// Cache key constructors. Every key the server touches is built here so
/// the keyspace stays auditable and invalidation stays exact.
pub mod keys {
    use super::Uuid;

    pub fn oidc_state(state: &str) -> String {
        format!("oidc:state:{state}")
    }

    pub fn setting(key: &str) -> String {
        format!("settings:{key}")
    }

    pub fn auth_providers() -> String {
        "auth:providers".to_string()
    }

    pub fn logs_query(hash: &str) -> String {
        format!("logs:query:{hash}")
    }

    pub fn logs_trace(project_id: Uuid, trace_id: &str) -> String {
        format!("logs:trace:{project_id}:{trace_id}")
    }

    pub fn logs_stats(hash: &str) -> String {
        format!("logs:stats:{hash}")
    }

    pub fn logs_services(hash: &str) -> String {
        format!("logs:services:{hash}")
    }

    pub fn live_channel(project_id: Uuid) -> String {
        format!("logs:live:{project_id}")
    }

    pub const LIVE_CHANNEL_PATTERN: &str = "logs:live:*";
}

/// Thin typed wrapper over the Redis connection. All operations are
/// best-effort: the SQL store is the source of truth and a cache outage
/// degrades to read-through misses, never to request failures.
#[derive(Clone)]
pub struct Cache {
    client: Option<redis::Client>,
    conn: Option<ConnectionManager>,
}

impl Cache {
    /// Connect using `REDIS_URL`. Returns a disabled cache when the
    /// variable is unset or the server is unreachable.
    pub async fn connect() -> Self {
        let Some(url) = crate::config::redis_url() else {
            tracing::warn!("REDIS_URL not set, running without cache/pubsub/queues");
            return Self::disabled();
        };

        let client = match redis::Client::open(url.as_str()) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!(error = %e, "Invalid REDIS_URL, running without cache");
                return Self::disabled();
            }
        };

        match client.get_connection_manager().await {
            Ok(conn) => Self {
                client: Some(client),
                conn: Some(conn),
            },
            Err(e) => {
                tracing::error!(error = %e, "Redis unreachable, running without cache");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self {
            client: None,
            conn: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    /// Raw connection handle for queue operations.
    pub fn conn(&self) -> Option<ConnectionManager> {
        self.conn.clone()
    }

    /// Client handle for pub/sub subscriptions (each subscriber needs its
    /// own connection).
    pub fn client(&self) -> Option<redis::Client> {
        self.client.clone()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone()?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(key = key, error = %e, "Discarding undeserializable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = key, error = %e, "Cache read failed");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = key, error = %e, "Cache serialization failed");
                return;
            }
        };
        if let Err(e) = conn.set_ex::<_, _, ()>(key, raw, ttl_secs).await {
            tracing::warn!(key = key, error = %e, "Cache write failed");
        }
    }

    pub async fn delete(&self, key: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(e) = conn.del::<_, ()>(key).await {
            tracing::warn!(key = key, error = %e, "Cache delete failed");
        }
    }

    /// Publish a payload on a pub/sub channel. Errors are logged, never
    /// propagated: publish failures must not abort ingestion.
    pub async fn publish(&self, channel: &str, payload: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        if let Err(e) = conn.publish::<_, _, ()>(channel, payload).await {
            tracing::warn!(channel = channel, error = %e, "Pub/sub publish failed");
        }
    }
}
