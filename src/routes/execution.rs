use axum::{
    extract::{Path, State},
    response::Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::execution_dto::{RunCodeRequest, RunCodeResponse};
use crate::AppState;

#[axum::debug_handler]
pub async fn run_code(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(payload): Json<RunCodeRequest>,
) -> crate::error::Result<Json<RunCodeResponse>> {
    payload.validate()?;
    tracing::debug!(%session_id, question_id = %payload.question_id, "running code against sample tests");
    let result = state
        .sessions
        .run_code(session_id, &payload.question_id, &payload.source_code)
        .await?;
    Ok(Json(RunCodeResponse {
        question_id: payload.question_id,
        result,
    }))
}
