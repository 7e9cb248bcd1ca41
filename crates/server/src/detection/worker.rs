//! Detection job handler: evaluate every in-scope rule against every log
//! in the batch, then fan matched rules out to the notification queue.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use shared_types::{AppError, DetectionJob, LogMatches, RuleMatch, SigmaRule};
use uuid::Uuid;

use crate::db::AppState;
use crate::jobs::Job;
use crate::repo;

/// Run one detection job. Errors propagate so the queue retries the whole
/// job under its retry policy.
pub async fn run(state: &AppState, job: &DetectionJob) -> Result<(), AppError> {
    let rules = repo::sigma_rules::list_enabled_in_scope(
        &state.pool,
        job.organization_id,
        job.project_id,
    )
    .await
    .inspect_err(|e| tracing::error!(error = %e, "Detection rule fetch failed"))?;

    if rules.is_empty() || job.logs.is_empty() {
        return Ok(());
    }

    let matches = evaluate_batch(&rules, job);
    if matches.is_empty() {
        return Ok(());
    }

    let total: usize = matches.iter().map(|m| m.matched_rules.len()).sum();
    tracing::info!(
        organization_id = %job.organization_id,
        logs = job.logs.len(),
        rules = rules.len(),
        matches = total,
        "Detection matches found"
    );

    // Group matches per rule for aggregate notification.
    let mut grouped: HashMap<Uuid, (usize, DateTime<Utc>)> = HashMap::new();
    for log_matches in &matches {
        let log_time = job.logs[log_matches.log_index].time;
        for rule_match in &log_matches.matched_rules {
            let entry = grouped
                .entry(rule_match.sigma_rule_id)
                .or_insert((0, log_time));
            entry.0 += 1;
            entry.1 = entry.1.min(log_time);
        }
    }

    for rule in &rules {
        let Some(&(match_count, first_seen)) = grouped.get(&rule.id) else {
            continue;
        };
        if rule.email_recipients.is_empty() && rule.webhook_url.is_none() {
            tracing::info!(rule = %rule.title, "Matched rule has no recipients, skipping notification");
            continue;
        }
        state
            .jobs
            .enqueue(Job::SigmaNotification(shared_types::SigmaNotificationJob {
                sigma_rule_id: rule.id,
                rule_title: rule.title.clone(),
                rule_level: rule.level.clone(),
                organization_id: rule.organization_id,
                project_id: job.project_id,
                match_count,
                first_seen,
                email_recipients: rule.email_recipients.clone(),
                webhook_url: rule.webhook_url.clone(),
            }))
            .await;
    }

    Ok(())
}

/// Evaluate every rule against every log. A rule whose detection tree
/// fails to evaluate is logged and skipped for that event; per-log output
/// only includes logs with at least one match.
pub fn evaluate_batch(rules: &[SigmaRule], job: &DetectionJob) -> Vec<LogMatches> {
    let mut out = Vec::new();
    for (log_index, event) in job.logs.iter().enumerate() {
        let mut matched_rules = Vec::new();
        for rule in rules {
            match super::sigma::evaluate_detection(&rule.detection, event) {
                Ok(true) => matched_rules.push(RuleMatch {
                    sigma_rule_id: rule.id,
                    rule_title: rule.title.clone(),
                    rule_level: rule.level.clone(),
                    matched_at: Utc::now(),
                }),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(rule = %rule.title, error = e, "Sigma rule evaluation failed");
                }
            }
        }
        if !matched_rules.is_empty() {
            out.push(LogMatches {
                log_index,
                matched_rules,
            });
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_types::DetectionEvent;

    fn rule(title: &str, detection: serde_json::Value) -> SigmaRule {
        SigmaRule {
            id: Uuid::new_v4(),
            organization_id: Uuid::new_v4(),
            project_id: None,
            sigma_id: format!("sigma-{title}"),
            title: title.to_string(),
            level: "high".to_string(),
            status: "stable".to_string(),
            enabled: true,
            logsource: json!({"product": "linux"}),
            detection,
            email_recipients: vec![],
            webhook_url: None,
            alert_rule_id: None,
            conversion_metadata: json!({}),
            created_at: Utc::now(),
        }
    }

    fn job(events: Vec<DetectionEvent>) -> DetectionJob {
        DetectionJob {
            logs: events,
            organization_id: Uuid::new_v4(),
            project_id: None,
        }
    }

    fn event(message: &str, level: &str) -> DetectionEvent {
        DetectionEvent {
            message: message.to_string(),
            level: level.to_string(),
            service: "auth".to_string(),
            time: Utc::now(),
            metadata: None,
        }
    }

    #[test]
    fn batch_evaluation_reports_log_indices() {
        let rules = vec![
            rule("failed-login", json!({"sel": {"message|contains": "failed password"}, "condition": "sel"})),
            rule("critical-any", json!({"sel": {"level": "critical"}, "condition": "sel"})),
        ];
        let job = job(vec![
            event("Failed password for root", "warn"),
            event("all quiet", "info"),
            event("disk failure", "critical"),
        ]);

        let matches = evaluate_batch(&rules, &job);
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].log_index, 0);
        assert_eq!(matches[0].matched_rules[0].rule_title, "failed-login");
        assert_eq!(matches[1].log_index, 2);
        assert_eq!(matches[1].matched_rules[0].rule_title, "critical-any");
    }

    #[test]
    fn broken_rule_does_not_poison_batch() {
        let rules = vec![
            rule("broken", json!({"condition": "nothing"})),
            rule("works", json!({"sel": {"level": "warn"}, "condition": "sel"})),
        ];
        let job = job(vec![event("x", "warn")]);

        let matches = evaluate_batch(&rules, &job);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].matched_rules.len(), 1);
        assert_eq!(matches[0].matched_rules[0].rule_title, "works");
    }
}
