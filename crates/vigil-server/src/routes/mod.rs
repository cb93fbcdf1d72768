//! Route definitions for the REST API.

mod focus;
mod health;
mod personas;
mod queue;
mod rules;
mod settings;
mod signals;

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::state::AppState;

/// Create the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Signals
        .route("/signals", post(signals::submit_signal).get(signals::list_signals))
        .route("/signals/unread", get(signals::list_unread))
        .route("/signals/unread-count", get(signals::unread_count))
        .route("/signals/:id", get(signals::get_signal))
        .route("/signals/:id/read", post(signals::mark_read))
        .route("/signals/:id/dismiss", post(signals::dismiss))
        .route("/signals/:id/feedback", post(signals::feedback))
        // Queue, digest and budget
        .route("/queue", get(queue::list_queue))
        .route("/queue/process", post(queue::process_queue))
        .route("/budget", get(queue::budget))
        .route("/clusters", get(queue::list_clusters))
        .route("/digest", get(queue::digest_status).post(queue::take_digest))
        .route("/digest/schedule", put(queue::set_digest_schedule))
        // Personas
        .route("/personas", get(personas::list_personas).post(personas::create_persona))
        .route(
            "/personas/active",
            get(personas::active_persona).put(personas::set_active_persona),
        )
        .route("/personas/:id", delete(personas::delete_persona))
        // Focus
        .route("/focus", get(focus::focus_status).delete(focus::deactivate))
        .route("/focus/zones", get(focus::list_zones).post(focus::create_zone))
        .route("/focus/zones/:id", delete(focus::delete_zone))
        .route("/focus/zones/:id/activate", post(focus::activate_zone))
        // Alert rules
        .route("/rules", get(rules::list_rules).post(rules::create_rule))
        .route("/rules/:id", put(rules::update_rule).delete(rules::delete_rule))
        .route("/rules/:id/toggle", post(rules::toggle_rule))
        // Quiet hours, snooze, learning
        .route(
            "/quiet-hours",
            get(settings::get_quiet_hours).put(settings::set_quiet_hours),
        )
        .route(
            "/snooze",
            get(settings::get_snooze)
                .post(settings::snooze)
                .delete(settings::unsnooze),
        )
        .route(
            "/learning",
            get(settings::get_learning)
                .put(settings::set_learning)
                .delete(settings::clear_learning),
        )
        .route("/preferences", get(settings::get_preferences))
        .route("/preferences/reset", post(settings::reset_preferences))
        // Attach state
        .with_state(state)
}

pub use focus::*;
pub use health::*;
pub use personas::*;
pub use queue::*;
pub use rules::*;
pub use settings::*;
pub use signals::*;
