//! Periodic alert evaluation: count matching logs over each rule's
//! window, trigger when the threshold is met and the rule has not already
//! fired within the window.

use shared_types::{AlertNotificationJob, AlertRule, AppError};

use crate::db::AppState;
use crate::jobs::Job;
use crate::repo;

/// Evaluator loop, spawned at startup.
pub async fn run_loop(state: AppState) {
    let interval = std::time::Duration::from_secs(crate::config::alert_eval_interval_secs());
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if let Err(e) = evaluate_all(&state).await {
            tracing::error!(error = %e, "Alert evaluation pass failed");
        }
    }
}

/// One evaluation pass over every enabled rule. A failing rule is logged
/// and does not stop the pass.
pub async fn evaluate_all(state: &AppState) -> Result<(), AppError> {
    let rules = repo::alert_rules::list_enabled(&state.pool).await?;
    for rule in rules {
        if let Err(e) = evaluate_rule(state, &rule).await {
            tracing::error!(rule = %rule.name, error = %e, "Alert rule evaluation failed");
        }
    }
    Ok(())
}

/// Evaluate a single rule and enqueue a notification when it fires.
pub async fn evaluate_rule(state: &AppState, rule: &AlertRule) -> Result<bool, AppError> {
    let count = repo::logs::count_for_alert(
        &state.pool,
        rule.organization_id,
        rule.project_id,
        rule.service.as_deref(),
        &rule.levels,
        rule.time_window_minutes,
    )
    .await?;

    if count < rule.threshold {
        return Ok(false);
    }

    // Idempotency: one alert per window, marked by the history row.
    if repo::alert_history::recent_exists(&state.pool, rule.id, rule.time_window_minutes).await? {
        return Ok(false);
    }

    let history = repo::alert_history::create(&state.pool, rule.id, count).await?;
    tracing::info!(
        rule = %rule.name,
        count = count,
        threshold = rule.threshold,
        "Alert triggered"
    );

    state
        .jobs
        .enqueue(Job::AlertNotification(AlertNotificationJob {
            history_id: history.id,
            rule_id: rule.id,
            rule_name: rule.name.clone(),
            organization_id: rule.organization_id,
            project_id: rule.project_id,
            log_count: count,
            threshold: rule.threshold,
            time_window: rule.time_window_minutes,
            email_recipients: rule.email_recipients.clone(),
            webhook_url: rule.webhook_url.clone(),
        }))
        .await;

    Ok(true)
}
