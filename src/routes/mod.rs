pub mod execution;
pub mod health;
pub mod session;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let session_api = Router::new()
        .route("/api/sessions", post(session::create_session))
        .route("/api/sessions/:id", get(session::get_session))
        .route("/api/sessions/:id/questions", get(session::get_questions))
        .route("/api/sessions/:id/result", get(session::get_result))
        .route("/api/sessions/:id/start", post(session::start_session))
        .route("/api/sessions/:id/answer", patch(session::save_answer))
        .route("/api/sessions/:id/navigate", post(session::navigate))
        .route("/api/sessions/:id/flag", post(session::toggle_flag))
        .route("/api/sessions/:id/events", post(session::report_signal))
        .route(
            "/api/sessions/:id/warning/dismiss",
            post(session::dismiss_warning),
        )
        .route("/api/sessions/:id/run", post(execution::run_code))
        .route("/api/sessions/:id/submit", post(session::submit))
        .route("/api/sessions/:id/resume", post(session::resume));

    Router::new()
        .route("/health", get(health::health))
        .merge(session_api)
        .with_state(state)
}
