//! services/api/src/web/mod.rs
//!
//! The HTTP surface: REST handlers, caller identity and shared state.

pub mod middleware;
pub mod rest;
pub mod state;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

pub use middleware::{require_user, UserId, USER_ID_HEADER};
pub use rest::ApiDoc;
pub use state::AppState;

/// Every REST route, all behind [`require_user`].
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/sessions",
            post(rest::generate_units_handler).get(rest::list_sessions_handler),
        )
        .route(
            "/sessions/{session_id}",
            get(rest::get_session_handler).delete(rest::delete_session_handler),
        )
        .route(
            "/sessions/{session_id}/status",
            put(rest::update_session_status_handler),
        )
        .route("/sessions/{session_id}/units", post(rest::add_word_handler))
        .route(
            "/sessions/{session_id}/units/{unit_id}/progress",
            get(rest::unit_progress_handler),
        )
        .route(
            "/sessions/{session_id}/units/{unit_id}/answers",
            post(rest::submit_answer_handler),
        )
        .route(
            "/sessions/{session_id}/units/{unit_id}/views",
            post(rest::section_view_handler),
        )
        .route("/passages", get(rest::passage_handler))
        .route("/words/identify", post(rest::identify_word_handler))
        .route("/words/morphology", post(rest::morphology_handler))
        .route("/words/{lemma}", get(rest::lookup_word_handler))
        .route("/quizzes", post(rest::quiz_handler))
        .route("/responses", post(rest::evaluate_handler))
        .route("/questions", post(rest::ask_handler))
        .route(
            "/insights",
            post(rest::create_insight_handler).get(rest::list_insights_handler),
        )
        .route(
            "/insights/{insight_id}",
            put(rest::update_insight_handler).delete(rest::delete_insight_handler),
        )
        .layer(axum_middleware::from_fn(require_user))
        .with_state(state)
}
