//! Custom alert rule endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;
use vigil_core::preferences::{RuleAction, RuleCondition, RuleLogic};
use vigil_core::CustomAlertRule;

/// GET /rules
pub async fn list_rules(State(state): State<AppState>) -> Json<Vec<CustomAlertRule>> {
    Json(state.engine().alert_rules())
}

/// Request body for creating or replacing a rule.
#[derive(Debug, Deserialize)]
pub struct RuleRequest {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub conditions: Vec<RuleCondition>,
    #[serde(default)]
    pub logic: RuleLogic,
    #[serde(default)]
    pub actions: Vec<RuleAction>,
}

fn default_enabled() -> bool {
    true
}

impl RuleRequest {
    fn into_rule(self, id: Option<String>, now: chrono::DateTime<chrono::Utc>) -> CustomAlertRule {
        let mut rule = CustomAlertRule::new(self.name, now).with_logic(self.logic);
        if let Some(id) = id {
            rule.id = id;
        }
        rule.enabled = self.enabled;
        rule.conditions = self.conditions;
        rule.actions = self.actions;
        rule
    }
}

/// POST /rules
pub async fn create_rule(
    State(state): State<AppState>,
    Json(request): Json<RuleRequest>,
) -> ApiResult<(StatusCode, Json<CustomAlertRule>)> {
    let engine = state.engine();
    let rule = engine.create_alert_rule(request.into_rule(None, engine.now()))?;
    Ok((StatusCode::CREATED, Json(rule)))
}

/// Replace a rule. Its creation time is kept.
/// PUT /rules/:id
pub async fn update_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RuleRequest>,
) -> ApiResult<Json<CustomAlertRule>> {
    let engine = state.engine();
    let rule = engine.update_alert_rule(request.into_rule(Some(id), engine.now()))?;
    Ok(Json(rule))
}

/// DELETE /rules/:id
pub async fn delete_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine().delete_alert_rule(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct ToggleRuleResponse {
    pub id: String,
    pub enabled: bool,
}

/// POST /rules/:id/toggle
pub async fn toggle_rule(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ToggleRuleResponse>> {
    let enabled = state.engine().toggle_alert_rule(&id)?;
    Ok(Json(ToggleRuleResponse { id, enabled }))
}
