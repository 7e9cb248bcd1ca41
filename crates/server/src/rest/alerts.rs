//! Alert rule endpoints. The evaluator and the notifier operate on the
//! same repo; this surface manages the rules themselves.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use shared_types::{
    AlertRule, AppError, CreateAlertRuleRequest, LogLevel, UpdateAlertRuleRequest, User,
};
use uuid::Uuid;
use validator::ValidateEmail;

use crate::auth::extractors::AuthRequired;
use crate::db::AppState;
use crate::repo;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ListAlertRulesParams {
    pub organization_id: Uuid,
}

async fn require_membership(
    state: &AppState,
    user: &User,
    organization_id: Uuid,
) -> Result<(), AppError> {
    if user.is_admin {
        return Ok(());
    }
    if !repo::organizations::is_member(&state.pool, user.id, organization_id).await? {
        return Err(AppError::forbidden("Not a member of this organization"));
    }
    Ok(())
}

fn validate_levels(levels: &[String]) -> Result<(), AppError> {
    for level in levels {
        if !LogLevel::is_valid(level) {
            return Err(AppError::bad_request(format!("invalid level: {level}")));
        }
    }
    Ok(())
}

fn validate_recipients(recipients: &[String]) -> Result<(), AppError> {
    for recipient in recipients {
        if !recipient.validate_email() {
            return Err(AppError::bad_request(format!(
                "invalid email recipient: {recipient}"
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// GET /api/v1/alerts/rules
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/v1/alerts/rules",
    params(ListAlertRulesParams),
    responses(
        (status = 200, description = "Alert rules", body = [AlertRule])
    ),
    tag = "alerts"
)]
pub async fn list_rules(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Query(params): Query<ListAlertRulesParams>,
) -> Result<Json<Vec<AlertRule>>, AppError> {
    require_membership(&state, &user, params.organization_id).await?;
    let rules = repo::alert_rules::list_for_organization(&state.pool, params.organization_id).await?;
    Ok(Json(rules))
}

// ---------------------------------------------------------------------------
// POST /api/v1/alerts/rules
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/api/v1/alerts/rules",
    request_body = CreateAlertRuleRequest,
    responses(
        (status = 201, description = "Rule created", body = AlertRule),
        (status = 400, description = "Invalid rule")
    ),
    tag = "alerts"
)]
pub async fn create_rule(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Json(body): Json<CreateAlertRuleRequest>,
) -> Result<(StatusCode, Json<AlertRule>), AppError> {
    require_membership(&state, &user, body.organization_id).await?;

    if body.name.trim().is_empty() {
        return Err(AppError::bad_request("name must not be empty"));
    }
    if body.time_window_minutes <= 0 {
        return Err(AppError::bad_request("timeWindowMinutes must be positive"));
    }
    if body.threshold <= 0 {
        return Err(AppError::bad_request("threshold must be positive"));
    }
    validate_levels(&body.levels)?;
    if let Some(recipients) = &body.email_recipients {
        validate_recipients(recipients)?;
    }

    let rule = repo::alert_rules::create(&state.pool, &body).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

// ---------------------------------------------------------------------------
// PUT /api/v1/alerts/rules/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    put,
    path = "/api/v1/alerts/rules/{id}",
    params(("id" = Uuid, Path, description = "Rule id")),
    request_body = UpdateAlertRuleRequest,
    responses(
        (status = 200, description = "Rule updated", body = AlertRule),
        (status = 404, description = "Not found")
    ),
    tag = "alerts"
)]
pub async fn update_rule(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateAlertRuleRequest>,
) -> Result<Json<AlertRule>, AppError> {
    let existing = repo::alert_rules::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Alert rule not found"))?;
    require_membership(&state, &user, existing.organization_id).await?;

    if let Some(levels) = &body.levels {
        validate_levels(levels)?;
    }
    if let Some(recipients) = &body.email_recipients {
        validate_recipients(recipients)?;
    }

    let updated = repo::alert_rules::update(&state.pool, id, &existing, &body)
        .await?
        .ok_or_else(|| AppError::not_found("Alert rule not found"))?;
    Ok(Json(updated))
}

// ---------------------------------------------------------------------------
// DELETE /api/v1/alerts/rules/{id}
// ---------------------------------------------------------------------------

#[utoipa::path(
    delete,
    path = "/api/v1/alerts/rules/{id}",
    params(("id" = Uuid, Path, description = "Rule id")),
    responses(
        (status = 200, description = "Rule deleted"),
        (status = 404, description = "Not found")
    ),
    tag = "alerts"
)]
pub async fn delete_rule(
    State(state): State<AppState>,
    AuthRequired(user): AuthRequired,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let existing = repo::alert_rules::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Alert rule not found"))?;
    require_membership(&state, &user, existing.organization_id).await?;

    repo::alert_rules::delete(&state.pool, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}
