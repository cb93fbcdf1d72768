//! Signal intake and interaction endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use vigil_core::{IntelligentSignal, ProcessOutcome, RawSignal};

/// Submit one signal.
/// POST /signals
///
/// The body is the lenient wire form: `id`, `domain` and `priority` are required,
/// everything else is optional. The response says whether the signal was
/// delivered, queued (and why) or rejected.
pub async fn submit_signal(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> ApiResult<Json<ProcessOutcome>> {
    let raw: RawSignal = serde_json::from_value(body)
        .map_err(|e| ApiError::bad_request(format!("Malformed signal: {}", e)))?;
    let engine = state.engine();
    let signal = raw.into_signal(engine.now())?;

    Ok(Json(engine.evaluate_signal(&signal)))
}

/// Delivered signals that are not dismissed, highest SIS first.
/// GET /signals
pub async fn list_signals(State(state): State<AppState>) -> Json<Vec<IntelligentSignal>> {
    Json(state.engine().active_signals())
}

/// GET /signals/unread
pub async fn list_unread(State(state): State<AppState>) -> Json<Vec<IntelligentSignal>> {
    Json(state.engine().unread_signals())
}

#[derive(Debug, Serialize)]
pub struct UnreadCountResponse {
    pub count: usize,
}

/// GET /signals/unread-count
pub async fn unread_count(State(state): State<AppState>) -> Json<UnreadCountResponse> {
    Json(UnreadCountResponse {
        count: state.engine().unread_count(),
    })
}

/// GET /signals/:id
pub async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<IntelligentSignal>> {
    state
        .engine()
        .signal(&id)
        .map(Json)
        .ok_or_else(|| ApiError::unknown_signal(&id))
}

/// POST /signals/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<IntelligentSignal>> {
    if !state.engine().mark_read(&id) {
        return Err(ApiError::unknown_signal(&id));
    }
    get_signal(State(state), Path(id)).await
}

/// POST /signals/:id/dismiss
pub async fn dismiss(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<IntelligentSignal>> {
    if !state.engine().dismiss(&id) {
        return Err(ApiError::unknown_signal(&id));
    }
    get_signal(State(state), Path(id)).await
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    /// -1 (not helpful), 0 or 1 (helpful).
    pub score: i8,
}

/// POST /signals/:id/feedback
pub async fn feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<FeedbackRequest>,
) -> ApiResult<Json<IntelligentSignal>> {
    if !(-1..=1).contains(&request.score) {
        return Err(ApiError::validation("Feedback score must be -1, 0 or 1")
            .with_details(serde_json::json!({ "score": request.score })));
    }
    if !state.engine().feedback(&id, request.score) {
        return Err(ApiError::unknown_signal(&id));
    }
    get_signal(State(state), Path(id)).await
}
