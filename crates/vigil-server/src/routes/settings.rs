//! Quiet hours, snooze, learning and preference endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use vigil_core::{IntelligentPreferences, QuietHoursConfig, UserBehaviorData};

#[derive(Debug, Serialize)]
pub struct QuietHoursResponse {
    #[serde(flatten)]
    pub config: QuietHoursConfig,
    /// Whether quiet hours hold back signals right now under the active persona.
    pub active: bool,
}

/// GET /quiet-hours
pub async fn get_quiet_hours(State(state): State<AppState>) -> Json<QuietHoursResponse> {
    let engine = state.engine();
    Json(QuietHoursResponse {
        config: engine.quiet_hours(),
        active: engine.is_quiet_hours(),
    })
}

/// PUT /quiet-hours
pub async fn set_quiet_hours(
    State(state): State<AppState>,
    Json(config): Json<QuietHoursConfig>,
) -> ApiResult<Json<QuietHoursResponse>> {
    let engine = state.engine();
    let config = engine.set_quiet_hours(config)?;
    Ok(Json(QuietHoursResponse {
        config,
        active: engine.is_quiet_hours(),
    }))
}

#[derive(Debug, Serialize)]
pub struct SnoozeResponse {
    pub snoozed: bool,
    pub until: Option<DateTime<Utc>>,
}

/// GET /snooze
pub async fn get_snooze(State(state): State<AppState>) -> Json<SnoozeResponse> {
    let until = state.engine().snooze_end();
    Json(SnoozeResponse {
        snoozed: until.is_some(),
        until,
    })
}

/// Either a duration in minutes or an absolute end time.
#[derive(Debug, Deserialize)]
pub struct SnoozeRequest {
    pub minutes: Option<i64>,
    pub until: Option<DateTime<Utc>>,
}

/// POST /snooze
pub async fn snooze(
    State(state): State<AppState>,
    Json(request): Json<SnoozeRequest>,
) -> ApiResult<Json<SnoozeResponse>> {
    let engine = state.engine();
    let until = match (request.minutes, request.until) {
        (Some(minutes), None) => engine.snooze_for(Duration::minutes(minutes))?,
        (None, Some(until)) => engine.snooze_until(until)?,
        _ => {
            return Err(ApiError::validation(
                "Provide exactly one of 'minutes' or 'until'",
            ))
        }
    };
    Ok(Json(SnoozeResponse {
        snoozed: true,
        until: Some(until),
    }))
}

/// DELETE /snooze
pub async fn unsnooze(State(state): State<AppState>) -> Json<SnoozeResponse> {
    state.engine().unsnooze();
    Json(SnoozeResponse {
        snoozed: false,
        until: None,
    })
}

#[derive(Debug, Deserialize)]
pub struct LearningRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct LearningResponse {
    pub enabled: bool,
    pub behavior: Option<UserBehaviorData>,
}

/// GET /learning
pub async fn get_learning(State(state): State<AppState>) -> Json<LearningResponse> {
    let engine = state.engine();
    Json(LearningResponse {
        enabled: engine.preferences().learning_enabled,
        behavior: engine.behavior(),
    })
}

/// PUT /learning
pub async fn set_learning(
    State(state): State<AppState>,
    Json(request): Json<LearningRequest>,
) -> Json<LearningResponse> {
    let engine = state.engine();
    engine.set_learning_enabled(request.enabled);
    Json(LearningResponse {
        enabled: request.enabled,
        behavior: engine.behavior(),
    })
}

/// Forget everything learned from interactions.
/// DELETE /learning
pub async fn clear_learning(State(state): State<AppState>) -> StatusCode {
    state.engine().clear_learning_data();
    StatusCode::NO_CONTENT
}

/// GET /preferences
pub async fn get_preferences(State(state): State<AppState>) -> Json<IntelligentPreferences> {
    Json(state.engine().preferences())
}

/// Restore default preferences. Learned behavior is kept.
/// POST /preferences/reset
pub async fn reset_preferences(State(state): State<AppState>) -> Json<IntelligentPreferences> {
    let engine = state.engine();
    engine.reset_preferences();
    Json(engine.preferences())
}
