//! Persona endpoints.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::ApiResult;
use crate::state::AppState;
use vigil_core::{BatchingMode, Persona, Priority, SignalDomain};

/// GET /personas
pub async fn list_personas(State(state): State<AppState>) -> Json<Vec<Persona>> {
    Json(state.engine().personas())
}

/// Request body for creating a persona. Unset fields take balanced defaults.
#[derive(Debug, Deserialize)]
pub struct CreatePersonaRequest {
    pub name: String,
    pub description: Option<String>,
    pub min_priority: Option<Priority>,
    #[serde(default)]
    pub domains: BTreeMap<SignalDomain, bool>,
    pub batching: Option<BatchingMode>,
    pub sound_enabled: Option<bool>,
    pub respect_quiet_hours: Option<bool>,
    pub hourly_limit: Option<u32>,
    pub daily_limit: Option<u32>,
}

impl From<CreatePersonaRequest> for Persona {
    fn from(request: CreatePersonaRequest) -> Self {
        let mut persona = Persona::new(request.name);
        if let Some(description) = request.description {
            persona = persona.with_description(description);
        }
        if let Some(priority) = request.min_priority {
            persona = persona.with_min_priority(priority);
        }
        for (domain, enabled) in request.domains {
            persona = persona.with_domain(domain, enabled);
        }
        if let Some(batching) = request.batching {
            persona = persona.with_batching(batching);
        }
        if let Some(sound) = request.sound_enabled {
            persona = persona.with_sound(sound);
        }
        if let Some(respect) = request.respect_quiet_hours {
            persona = persona.with_quiet_hours(respect);
        }
        let hourly = request.hourly_limit.unwrap_or(persona.hourly_limit);
        let daily = request.daily_limit.unwrap_or(persona.daily_limit);
        persona.with_limits(hourly, daily)
    }
}

/// POST /personas
pub async fn create_persona(
    State(state): State<AppState>,
    Json(request): Json<CreatePersonaRequest>,
) -> ApiResult<(StatusCode, Json<Persona>)> {
    let persona = state.engine().create_persona(request.into())?;
    Ok((StatusCode::CREATED, Json(persona)))
}

/// Built-in personas cannot be deleted.
/// DELETE /personas/:id
pub async fn delete_persona(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.engine().delete_persona(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /personas/active
pub async fn active_persona(State(state): State<AppState>) -> Json<Persona> {
    Json(state.engine().active_persona())
}

#[derive(Debug, Deserialize)]
pub struct SetActivePersonaRequest {
    pub id: String,
}

/// PUT /personas/active
pub async fn set_active_persona(
    State(state): State<AppState>,
    Json(request): Json<SetActivePersonaRequest>,
) -> ApiResult<Json<Persona>> {
    Ok(Json(state.engine().set_active_persona(&request.id)?))
}
