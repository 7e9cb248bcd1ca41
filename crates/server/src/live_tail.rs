//! Live-tail fan-out: per-project broadcast channels bridged over Redis
//! pub/sub when it is configured, purely in-process otherwise.
//!
//! Publishing happens only after the ingestion transaction commits, and a
//! slow subscriber never blocks the publisher: `broadcast` drops the
//! oldest buffered events for a lagging receiver, and the receiver turns
//! the lag into a `dropped` frame.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use futures::StreamExt;
use shared_types::LogRecord;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::cache::{keys, Cache};

/// Per-channel buffer. Subscribers falling further behind than this lose
/// the oldest events and are told how many.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct LiveTailBus {
    channels: Arc<RwLock<HashMap<Uuid, broadcast::Sender<LogRecord>>>>,
    cache: Cache,
}

impl LiveTailBus {
    pub fn new(cache: Cache) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            cache,
        }
    }

    fn sender_for(&self, project_id: Uuid) -> broadcast::Sender<LogRecord> {
        if let Some(tx) = self.channels.read().unwrap().get(&project_id) {
            return tx.clone();
        }
        let mut channels = self.channels.write().unwrap();
        channels
            .entry(project_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    pub fn subscribe(&self, project_id: Uuid) -> broadcast::Receiver<LogRecord> {
        self.sender_for(project_id).subscribe()
    }

    /// Publish a committed log to its tenant channel. With Redis
    /// configured the message travels via pub/sub (so every server
    /// instance sees it); local delivery then happens in the bridge task.
    pub async fn publish(&self, log: &LogRecord) {
        if self.cache.is_enabled() {
            match serde_json::to_string(log) {
                Ok(payload) => {
                    self.cache
                        .publish(&keys::live_channel(log.project_id), &payload)
                        .await;
                }
                Err(e) => tracing::warn!(error = %e, "Failed to serialize live-tail event"),
            }
        } else {
            self.publish_local(log);
        }
    }

    /// Deliver to in-process subscribers. A send error only means nobody
    /// is listening on this project right now.
    pub fn publish_local(&self, log: &LogRecord) {
        if let Some(tx) = self.channels.read().unwrap().get(&log.project_id) {
            let _ = tx.send(log.clone());
        }
    }

    /// Bridge Redis pub/sub messages back into the in-process channels.
    /// Runs for the process lifetime; reconnects with backoff on error.
    pub async fn run_redis_bridge(self) {
        let Some(client) = self.cache.client() else {
            return;
        };

        loop {
            let mut pubsub = match client.get_async_pubsub().await {
                Ok(pubsub) => pubsub,
                Err(e) => {
                    tracing::warn!(error = %e, "Live-tail bridge connect failed, retrying");
                    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    continue;
                }
            };

            if let Err(e) = pubsub.psubscribe(keys::LIVE_CHANNEL_PATTERN).await {
                tracing::warn!(error = %e, "Live-tail bridge subscribe failed, retrying");
                tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                continue;
            }

            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(error = %e, "Undecodable live-tail payload");
                        continue;
                    }
                };
                match serde_json::from_str::<LogRecord>(&payload) {
                    Ok(log) => self.publish_local(&log),
                    Err(e) => tracing::warn!(error = %e, "Undeserializable live-tail event"),
                }
            }

            tracing::warn!("Live-tail bridge stream ended, reconnecting");
        }
    }
}
