//! Background job queues over Redis lists. One FIFO queue per worker
//! family; failed jobs are re-enqueued with a backoff until the attempt
//! budget is spent, then dropped with an error log.

use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use shared_types::{AlertNotificationJob, AppError, DetectionJob, SigmaNotificationJob};

use crate::cache::Cache;
use crate::db::AppState;

pub const DETECTION_QUEUE: &str = "jobs:detection";
pub const NOTIFICATION_QUEUE: &str = "jobs:notifications";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    Detection(DetectionJob),
    AlertNotification(AlertNotificationJob),
    SigmaNotification(SigmaNotificationJob),
}

impl Job {
    fn queue(&self) -> &'static str {
        match self {
            Job::Detection(_) => DETECTION_QUEUE,
            Job::AlertNotification(_) | Job::SigmaNotification(_) => NOTIFICATION_QUEUE,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Job::Detection(_) => "detection",
            Job::AlertNotification(_) => "alert_notification",
            Job::SigmaNotification(_) => "sigma_notification",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    job: Job,
    attempts: u32,
}

#[derive(Clone)]
pub struct JobQueue {
    cache: Cache,
}

impl JobQueue {
    pub fn new(cache: Cache) -> Self {
        Self { cache }
    }

    /// Enqueue a job. Best-effort from the caller's point of view:
    /// failures are logged, never propagated into request handling.
    pub async fn enqueue(&self, job: Job) {
        if let Err(e) = self.push(Envelope { job, attempts: 0 }).await {
            tracing::error!(error = %e, "Failed to enqueue background job");
        }
    }

    async fn push(&self, envelope: Envelope) -> Result<(), String> {
        let Some(mut conn) = self.cache.conn() else {
            return Err("job broker not configured".to_string());
        };
        let payload = serde_json::to_string(&envelope).map_err(|e| e.to_string())?;
        conn.lpush::<_, _, ()>(envelope.job.queue(), payload)
            .await
            .map_err(|e| e.to_string())
    }

    /// Blocking pop with a short timeout so worker shutdown stays responsive.
    async fn pop(&self, queue: &str) -> Option<Envelope> {
        let mut conn = self.cache.conn()?;
        let reply: Option<(String, String)> = match conn.brpop(queue, 5.0).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(queue = queue, error = %e, "Queue pop failed");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                None
            }
        };
        let (_, payload) = reply?;
        match serde_json::from_str(&payload) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                tracing::error!(queue = queue, error = %e, "Dropping undeserializable job");
                None
            }
        }
    }
}

/// Spawn the worker tasks for both queues at the configured concurrency.
pub fn spawn_workers(state: AppState) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();
    for queue in [DETECTION_QUEUE, NOTIFICATION_QUEUE] {
        for _ in 0..crate::config::worker_concurrency() {
            let state = state.clone();
            handles.push(tokio::spawn(worker_loop(state, queue)));
        }
    }
    handles
}

async fn worker_loop(state: AppState, queue: &'static str) {
    if !state.cache.is_enabled() {
        tracing::warn!(queue = queue, "Job broker not configured, worker exiting");
        return;
    }
    tracing::info!(queue = queue, "Worker started");

    loop {
        let Some(mut envelope) = state.jobs.pop(queue).await else {
            continue;
        };

        match dispatch(&state, &envelope.job).await {
            Ok(()) => {}
            Err(e) => {
                envelope.attempts += 1;
                let kind = envelope.job.describe();
                tracing::error!(
                    job = kind,
                    attempts = envelope.attempts,
                    error = %e,
                    "Job failed"
                );
                if envelope.attempts < crate::config::job_max_attempts() {
                    // Linear backoff before the retry becomes visible.
                    tokio::time::sleep(std::time::Duration::from_secs(
                        envelope.attempts as u64 * 2,
                    ))
                    .await;
                    if let Err(e) = state.jobs.push(envelope).await {
                        tracing::error!(job = kind, error = %e, "Failed to re-enqueue job");
                    }
                } else {
                    tracing::error!(job = kind, "Job exhausted retry budget, dropping");
                }
            }
        }
    }
}

async fn dispatch(state: &AppState, job: &Job) -> Result<(), AppError> {
    match job {
        Job::Detection(job) => crate::detection::worker::run(state, job).await,
        Job::AlertNotification(job) => crate::alerts::notifier::run(state, job).await,
        Job::SigmaNotification(job) => crate::alerts::notifier::run_sigma(state, job).await,
    }
}
