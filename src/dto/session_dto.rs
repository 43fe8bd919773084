use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::question::CandidateQuestion;
use crate::models::result::QuizResult;
use crate::services::proctoring::{ProctoringSignal, ViolationWarning};
use crate::services::session::SessionState;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSessionRequest {
    #[validate(length(min = 1))]
    pub quiz_id: String,
    #[validate(length(min = 1))]
    pub candidate_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub fullscreen: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaveAnswerRequest {
    #[validate(length(min = 1))]
    pub question_id: String,
    pub answer: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigateRequest {
    pub index: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagRequest {
    pub question_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalRequest {
    pub signal: ProctoringSignal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub confirm_unanswered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionProgress {
    pub question_id: String,
    pub answered: bool,
    pub flagged: bool,
}

/// Everything the page needs to draw the overlay, the warning toast and the
/// question grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub quiz_id: String,
    pub candidate_id: String,
    pub state: SessionState,
    pub current_index: usize,
    pub question_count: usize,
    pub questions: Vec<QuestionProgress>,
    pub violation_count: u32,
    pub max_violations: u32,
    pub fullscreen_overlay: bool,
    pub warning: Option<ViolationWarning>,
    pub is_submitting: bool,
    pub result_pending_retry: bool,
    /// False when the last progress snapshot could not be written.
    pub checkpoint_saved: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub total_marks: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionQuestionsResponse {
    pub session_id: Uuid,
    pub title: String,
    pub duration_minutes: u32,
    pub questions: Vec<CandidateQuestion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitResponse {
    ConfirmationRequired { unanswered: Vec<String> },
    Submitted { result: QuizResult },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalResponse {
    pub outcome: String,
    pub session: SessionView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<QuizResult>,
}
