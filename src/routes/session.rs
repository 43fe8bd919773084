use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::session_dto::{
    CreateSessionRequest, FlagRequest, NavigateRequest, SaveAnswerRequest, SessionQuestionsResponse,
    SessionView, SignalRequest, SignalResponse, StartSessionRequest, SubmitRequest, SubmitResponse,
};
use crate::models::result::QuizResult;
use crate::AppState;

#[axum::debug_handler]
pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> crate::error::Result<Response> {
    payload.validate()?;
    let view = state
        .sessions
        .create_session(&payload.quiz_id, &payload.candidate_id)
        .await?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Json<SessionView>> {
    Ok(Json(state.sessions.view(session_id).await?))
}

#[axum::debug_handler]
pub async fn get_questions(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Json<SessionQuestionsResponse>> {
    Ok(Json(state.sessions.questions(session_id).await?))
}

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Json<QuizResult>> {
    Ok(Json(state.sessions.result(session_id).await?))
}

#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<StartSessionRequest>,
) -> crate::error::Result<Json<SessionView>> {
    Ok(Json(state.sessions.start(session_id, payload.fullscreen).await?))
}

#[axum::debug_handler]
pub async fn save_answer(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SaveAnswerRequest>,
) -> crate::error::Result<Json<SessionView>> {
    payload.validate()?;
    let view = state
        .sessions
        .record_answer(session_id, &payload.question_id, payload.answer)
        .await?;
    Ok(Json(view))
}

#[axum::debug_handler]
pub async fn navigate(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<NavigateRequest>,
) -> crate::error::Result<Json<SessionView>> {
    Ok(Json(state.sessions.go_to(session_id, payload.index).await?))
}

#[axum::debug_handler]
pub async fn toggle_flag(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<FlagRequest>,
) -> crate::error::Result<Json<SessionView>> {
    Ok(Json(
        state
            .sessions
            .toggle_flag(session_id, &payload.question_id)
            .await?,
    ))
}

#[axum::debug_handler]
pub async fn report_signal(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<SignalRequest>,
) -> crate::error::Result<Json<SignalResponse>> {
    let (outcome, session, result) = state
        .sessions
        .report_signal(session_id, payload.signal)
        .await?;
    Ok(Json(SignalResponse {
        outcome: outcome.as_str().to_string(),
        session,
        result,
    }))
}

#[axum::debug_handler]
pub async fn dismiss_warning(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Json<SessionView>> {
    Ok(Json(state.sessions.dismiss_warning(session_id).await?))
}

#[axum::debug_handler]
pub async fn submit(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    payload: Option<Json<SubmitRequest>>,
) -> crate::error::Result<Json<SubmitResponse>> {
    let confirm = payload.map(|Json(p)| p.confirm_unanswered).unwrap_or(false);
    Ok(Json(state.sessions.submit(session_id, confirm).await?))
}

#[axum::debug_handler]
pub async fn resume(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> crate::error::Result<Json<SessionView>> {
    Ok(Json(state.sessions.resume(session_id).await?))
}
