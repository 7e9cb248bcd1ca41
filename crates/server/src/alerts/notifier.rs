//! Notification fan-out: in-app rows, email, webhook. Channels are
//! best-effort and isolated; a failure in one never blocks the others.

use chrono::Utc;
use shared_types::{AlertNotificationJob, AlertWebhookPayload, AppError, SigmaNotificationJob};
use uuid::Uuid;

use crate::db::AppState;
use crate::repo;

const WEBHOOK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);

/// Handle an alert notification job end to end, then mark the history
/// row notified.
pub async fn run(state: &AppState, job: &AlertNotificationJob) -> Result<(), AppError> {
    let title = format!("Alert triggered: {}", job.rule_name);
    let body = format!(
        "{} matching logs in the last {} minutes (threshold: {})",
        job.log_count, job.time_window, job.threshold
    );
    notify_members(state, job.organization_id, &title, &body).await;

    for recipient in &job.email_recipients {
        crate::mailer::send_alert_email(
            recipient,
            &job.rule_name,
            job.log_count,
            job.threshold,
            job.time_window,
        )
        .await;
    }
    if !job.email_recipients.is_empty() {
        tracing::info!(rule = %job.rule_name, "Email notifications sent");
    }

    if let Some(webhook_url) = &job.webhook_url {
        let payload = AlertWebhookPayload {
            alert_name: job.rule_name.clone(),
            log_count: job.log_count,
            threshold: job.threshold,
            time_window: job.time_window,
            timestamp: Utc::now(),
            project_id: job.project_id,
        };
        if let Some(status_text) = post_webhook(state, webhook_url, &payload).await {
            let error = format!("Webhook failed: {status_text}");
            if let Err(e) =
                repo::alert_history::mark_as_notified(&state.pool, job.history_id, Some(&error))
                    .await
            {
                tracing::error!(error = %e, "Failed to record webhook failure");
            }
        }
    }

    repo::alert_history::mark_as_notified(&state.pool, job.history_id, None).await?;
    Ok(())
}

/// Handle a Sigma detection notification job.
pub async fn run_sigma(state: &AppState, job: &SigmaNotificationJob) -> Result<(), AppError> {
    let title = format!("Detection: {}", job.rule_title);
    let body = format!(
        "{} matching events since {} (severity: {})",
        job.match_count,
        job.first_seen.to_rfc3339(),
        job.rule_level
    );
    notify_members(state, job.organization_id, &title, &body).await;

    for recipient in &job.email_recipients {
        crate::mailer::send_detection_email(recipient, &job.rule_title, &job.rule_level, job.match_count)
            .await;
    }
    if !job.email_recipients.is_empty() {
        tracing::info!(rule = %job.rule_title, "Email notifications sent");
    }

    if let Some(webhook_url) = &job.webhook_url {
        let payload = serde_json::json!({
            "rule_title": job.rule_title,
            "rule_level": job.rule_level,
            "match_count": job.match_count,
            "first_seen": job.first_seen,
            "timestamp": Utc::now(),
            "project_id": job.project_id,
        });
        if let Some(status_text) = post_webhook(state, webhook_url, &payload).await {
            tracing::warn!(rule = %job.rule_title, "Webhook failed: {status_text}");
        }
    }

    Ok(())
}

/// Insert an in-app notification for every member of the organization.
async fn notify_members(state: &AppState, organization_id: Uuid, title: &str, body: &str) {
    let members = match repo::organizations::member_user_ids(&state.pool, organization_id).await {
        Ok(members) => members,
        Err(e) => {
            tracing::error!(error = %e, "Failed to list organization members");
            return;
        }
    };
    if members.is_empty() {
        tracing::info!(organization_id = %organization_id, "No members to notify, skipping in-app notifications");
        return;
    }

    for user_id in members {
        if let Err(e) = repo::notifications::create(&state.pool, user_id, title, body).await {
            tracing::error!(error = %e, user_id = %user_id, "Failed to insert notification");
        }
    }
}

/// POST the payload; returns the status text on a non-2xx response, None
/// on success. Transport errors count as failures too.
async fn post_webhook<T: serde::Serialize>(
    state: &AppState,
    url: &str,
    payload: &T,
) -> Option<String> {
    match state
        .http
        .post(url)
        .timeout(WEBHOOK_TIMEOUT)
        .json(payload)
        .send()
        .await
    {
        Ok(response) if response.status().is_success() => None,
        Ok(response) => Some(
            response
                .status()
                .canonical_reason()
                .unwrap_or("Unknown Error")
                .to_string(),
        ),
        Err(e) => Some(e.to_string()),
    }
}
