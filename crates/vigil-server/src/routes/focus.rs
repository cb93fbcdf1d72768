//! Focus zone endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use vigil_core::preferences::FocusSchedule;
use vigil_core::{ActiveFocus, FocusZone, SignalDomain};

/// GET /focus/zones
pub async fn list_zones(State(state): State<AppState>) -> Json<Vec<FocusZone>> {
    Json(state.engine().focus_zones())
}

#[derive(Debug, Deserialize)]
pub struct CreateFocusZoneRequest {
    pub name: String,
    pub domains: Vec<SignalDomain>,
    /// Recurring window during which the zone applies on its own.
    pub schedule: Option<FocusSchedule>,
}

/// POST /focus/zones
pub async fn create_zone(
    State(state): State<AppState>,
    Json(request): Json<CreateFocusZoneRequest>,
) -> ApiResult<(StatusCode, Json<FocusZone>)> {
    let engine = state.engine();
    let mut zone = FocusZone::new(request.name, request.domains, engine.now());
    if let Some(schedule) = request.schedule {
        zone = zone.with_schedule(schedule);
    }
    let zone = engine.create_focus_zone(zone)?;
    Ok((StatusCode::CREATED, Json(zone)))
}

/// DELETE /focus/zones/:id
pub async fn delete_zone(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine().delete_focus_zone(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivateFocusRequest {
    /// Minutes until the focus ends on its own. Open-ended when unset.
    pub duration_minutes: Option<i64>,
}

/// POST /focus/zones/:id/activate
pub async fn activate_zone(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ActivateFocusRequest>,
) -> ApiResult<Json<ActiveFocus>> {
    let duration = match request.duration_minutes {
        Some(minutes) if minutes <= 0 => {
            return Err(ApiError::validation("Focus duration must be positive"));
        }
        Some(minutes) => Some(chrono::Duration::minutes(minutes)),
        None => None,
    };
    Ok(Json(state.engine().activate_focus_zone(&id, duration)?))
}

#[derive(Debug, Serialize)]
pub struct FocusStatusResponse {
    pub active: Option<ActiveFocus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<FocusZone>,
}

/// The focus in effect now, manual or scheduled.
/// GET /focus
pub async fn focus_status(State(state): State<AppState>) -> Json<FocusStatusResponse> {
    let engine = state.engine();
    let active = engine.active_focus();
    let zone = active.as_ref().and_then(|focus| {
        engine
            .focus_zones()
            .into_iter()
            .find(|zone| zone.id == focus.zone_id)
    });
    Json(FocusStatusResponse { active, zone })
}

#[derive(Debug, Serialize)]
pub struct DeactivateFocusResponse {
    pub deactivated: bool,
}

/// End a manual focus.
/// DELETE /focus
pub async fn deactivate(State(state): State<AppState>) -> Json<DeactivateFocusResponse> {
    Json(DeactivateFocusResponse {
        deactivated: state.engine().deactivate_focus(),
    })
}
