//! Deferred queue, digest and budget endpoints.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::ApiResult;
use crate::state::AppState;
use vigil_core::{BudgetStatus, Digest, DigestSchedule, DrainReport, NotificationCluster, QueuedSignal};

/// GET /queue
pub async fn list_queue(State(state): State<AppState>) -> Json<Vec<QueuedSignal>> {
    Json(state.engine().queued_signals())
}

/// Retry deferred signals now.
/// POST /queue/process
pub async fn process_queue(State(state): State<AppState>) -> Json<DrainReport> {
    Json(state.engine().process_queue())
}

/// GET /budget
pub async fn budget(State(state): State<AppState>) -> Json<BudgetStatus> {
    Json(state.engine().budget_status())
}

/// GET /clusters
pub async fn list_clusters(State(state): State<AppState>) -> Json<Vec<NotificationCluster>> {
    Json(state.engine().clusters())
}

#[derive(Debug, Serialize)]
pub struct DigestStatusResponse {
    pub due: bool,
    pub held: usize,
    pub schedule: DigestSchedule,
}

/// GET /digest
pub async fn digest_status(State(state): State<AppState>) -> Json<DigestStatusResponse> {
    let engine = state.engine();
    let held = engine
        .queued_signals()
        .iter()
        .filter(|entry| entry.reason.is_digest())
        .count();

    Json(DigestStatusResponse {
        due: engine.digest_due(),
        held,
        schedule: engine.preferences().digest_schedule,
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct TakeDigestRequest {
    /// Deliver even if no digest slot has passed.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
pub struct TakeDigestResponse {
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
}

/// POST /digest
pub async fn take_digest(
    State(state): State<AppState>,
    Json(request): Json<TakeDigestRequest>,
) -> Json<TakeDigestResponse> {
    let digest = state.engine().take_digest(request.force);
    Json(TakeDigestResponse {
        delivered: digest.is_some(),
        digest,
    })
}

/// PUT /digest/schedule
pub async fn set_digest_schedule(
    State(state): State<AppState>,
    Json(schedule): Json<DigestSchedule>,
) -> ApiResult<Json<DigestSchedule>> {
    Ok(Json(state.engine().set_digest_schedule(schedule)?))
}
