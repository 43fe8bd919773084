use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::dto::session_dto::{QuestionProgress, SessionView};
use crate::models::attempt::{Attempt, SessionCheckpoint};
use crate::models::quiz::LoadedQuiz;
use crate::models::result::{CompletionStatus, QuestionResult, QuizResult};
use crate::services::proctoring::{
    ProctoringOutcome, ProctoringPolicy, ProctoringSignal, ViolationMonitor,
};
use crate::utils::time::now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress,
    Submitting,
    Completed,
    Terminated,
}

impl SessionState {
    pub fn is_finished(&self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Terminated)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Fullscreen mode is required to start the quiz")]
    FullscreenRequired,
    #[error("The quiz has not been started")]
    NotStarted,
    #[error("A submission is already in progress")]
    SubmissionInProgress,
    #[error("The quiz has already been submitted")]
    AlreadySubmitted,
    #[error("Answers are already graded; retry the submission to save them")]
    ResultPending,
    #[error("Question '{0}' is not part of this quiz")]
    UnknownQuestion(String),
    #[error("Question '{0}' is not a coding question")]
    NotCodingQuestion(String),
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::FullscreenRequired => "fullscreen_required",
            SessionError::NotStarted => "not_started",
            SessionError::SubmissionInProgress => "submission_in_progress",
            SessionError::AlreadySubmitted => "already_submitted",
            SessionError::ResultPending => "result_pending",
            SessionError::UnknownQuestion(_) => "unknown_question",
            SessionError::NotCodingQuestion(_) => "not_coding_question",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SessionError::FullscreenRequired => StatusCode::PRECONDITION_REQUIRED,
            SessionError::UnknownQuestion(_) | SessionError::NotCodingQuestion(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::CONFLICT,
        }
    }
}

/// Why a submission was started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual { confirm_unanswered: bool },
    TimeExpired,
    Violation { reason: String },
}

/// Handed out by `begin_submission`; holding one means this caller owns the
/// submission until it calls `complete_submission` or `fail_submission`.
#[derive(Debug, Clone)]
pub struct SubmissionTicket {
    pub session_id: Uuid,
    pub candidate_id: String,
    pub quiz: Arc<LoadedQuiz>,
    pub answers: BTreeMap<String, String>,
    pub termination_reason: Option<String>,
    pub violation_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    /// Result graded by an earlier attempt whose write failed.
    pub graded: Option<QuizResult>,
}

impl SubmissionTicket {
    pub fn assemble(
        &self,
        question_results: Vec<QuestionResult>,
        completed_at: DateTime<Utc>,
    ) -> QuizResult {
        let score: Decimal = question_results.iter().map(|r| r.score).sum();
        QuizResult {
            id: Uuid::new_v4(),
            session_id: self.session_id,
            quiz_id: self.quiz.quiz.id.clone(),
            candidate_id: self.candidate_id.clone(),
            score,
            total_possible: self.quiz.total_marks(),
            question_results: question_results
                .into_iter()
                .map(|r| (r.question_id.clone(), r))
                .collect(),
            status: if self.termination_reason.is_some() {
                CompletionStatus::Terminated
            } else {
                CompletionStatus::Completed
            },
            termination_reason: self.termination_reason.clone(),
            violation_count: self.violation_count,
            started_at: self.started_at,
            completed_at,
        }
    }
}

#[derive(Debug)]
pub enum SubmitDecision {
    NeedsConfirmation { unanswered: Vec<String> },
    Proceed(SubmissionTicket),
}

/// State machine for one proctored attempt.
#[derive(Debug)]
pub struct ProctoredSession {
    id: Uuid,
    candidate_id: String,
    quiz: Arc<LoadedQuiz>,
    policy: ProctoringPolicy,
    attempt: Attempt,
    state: SessionState,
    monitor: ViolationMonitor,
    pending: Option<QuizResult>,
    result: Option<QuizResult>,
    last_active_at: DateTime<Utc>,
    checkpoint_saved: bool,
}

impl ProctoredSession {
    pub fn new(
        id: Uuid,
        candidate_id: String,
        quiz: Arc<LoadedQuiz>,
        policy: ProctoringPolicy,
    ) -> Self {
        Self {
            id,
            candidate_id,
            quiz,
            policy,
            attempt: Attempt::default(),
            state: SessionState::NotStarted,
            monitor: ViolationMonitor::default(),
            pending: None,
            result: None,
            last_active_at: now(),
            checkpoint_saved: true,
        }
    }

    /// Rebuilds a session from a checkpoint. The candidate has to enter
    /// fullscreen again before answering.
    pub fn restore(
        checkpoint: SessionCheckpoint,
        quiz: Arc<LoadedQuiz>,
        policy: ProctoringPolicy,
    ) -> Self {
        let mut attempt = checkpoint.attempt;
        attempt
            .answers
            .retain(|qid, _| quiz.question(qid).is_some());
        attempt.flags.retain(|qid| quiz.question(qid).is_some());
        if attempt.current_index >= quiz.question_count() {
            attempt.current_index = 0;
        }
        let monitor = ViolationMonitor::with_count(attempt.violations);
        Self {
            id: checkpoint.session_id,
            candidate_id: checkpoint.candidate_id,
            quiz,
            policy,
            attempt,
            state: SessionState::NotStarted,
            monitor,
            pending: None,
            result: None,
            last_active_at: now(),
            checkpoint_saved: true,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn quiz(&self) -> &Arc<LoadedQuiz> {
        &self.quiz
    }

    pub fn attempt(&self) -> &Attempt {
        &self.attempt
    }

    pub fn result(&self) -> Option<&QuizResult> {
        self.result.as_ref()
    }

    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_active_at = at;
    }

    /// Open sessions untouched since `cutoff`. Sessions mid-submission or
    /// holding a graded result awaiting its write are never idle.
    pub fn is_idle_since(&self, cutoff: DateTime<Utc>) -> bool {
        matches!(self.state, SessionState::NotStarted | SessionState::InProgress)
            && self.pending.is_none()
            && self.last_active_at <= cutoff
    }

    pub fn set_checkpoint_saved(&mut self, saved: bool) {
        self.checkpoint_saved = saved;
    }

    fn ensure_live(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::InProgress if self.pending.is_some() => Err(SessionError::ResultPending),
            SessionState::InProgress => Ok(()),
            SessionState::NotStarted => Err(SessionError::NotStarted),
            SessionState::Submitting => Err(SessionError::SubmissionInProgress),
            SessionState::Completed | SessionState::Terminated => {
                Err(SessionError::AlreadySubmitted)
            }
        }
    }

    pub fn start(&mut self, fullscreen_entered: bool, now: DateTime<Utc>) -> Result<(), SessionError> {
        match self.state {
            SessionState::InProgress => return Ok(()),
            SessionState::Submitting => return Err(SessionError::SubmissionInProgress),
            SessionState::Completed | SessionState::Terminated => {
                return Err(SessionError::AlreadySubmitted)
            }
            SessionState::NotStarted => {}
        }
        if !fullscreen_entered {
            return Err(SessionError::FullscreenRequired);
        }
        self.attempt.started_at.get_or_insert(now);
        self.monitor.arm(now, &self.policy);
        self.state = SessionState::InProgress;
        Ok(())
    }

    /// Overwrites the answer for `question_id`. Returns whether it changed.
    pub fn record_answer(&mut self, question_id: &str, answer: String) -> Result<bool, SessionError> {
        self.ensure_live()?;
        if self.quiz.question(question_id).is_none() {
            return Err(SessionError::UnknownQuestion(question_id.to_string()));
        }
        let previous = self.attempt.answers.insert(question_id.to_string(), answer);
        Ok(previous.as_deref() != self.attempt.answers.get(question_id).map(String::as_str))
    }

    /// Moves to `index`; indexes outside the quiz are ignored.
    pub fn go_to(&mut self, index: usize) -> Result<(), SessionError> {
        self.ensure_live()?;
        if index < self.quiz.question_count() {
            self.attempt.current_index = index;
        }
        Ok(())
    }

    /// Returns the new flag state.
    pub fn toggle_flag(&mut self, question_id: &str) -> Result<bool, SessionError> {
        self.ensure_live()?;
        if self.quiz.question(question_id).is_none() {
            return Err(SessionError::UnknownQuestion(question_id.to_string()));
        }
        if self.attempt.flags.remove(question_id) {
            Ok(false)
        } else {
            self.attempt.flags.insert(question_id.to_string());
            Ok(true)
        }
    }

    pub fn observe(&mut self, signal: ProctoringSignal, now: DateTime<Utc>) -> ProctoringOutcome {
        if self.state != SessionState::InProgress {
            return ProctoringOutcome::Ignored;
        }
        let outcome = self.monitor.observe(signal, now, &self.policy);
        self.attempt.violations = self.monitor.violations();
        outcome
    }

    pub fn dismiss_warning(&mut self) {
        self.monitor.dismiss_warning();
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        let minutes = self.quiz.quiz.duration_minutes;
        if minutes == 0 {
            return None;
        }
        self.attempt
            .started_at
            .map(|start| start + Duration::minutes(i64::from(minutes)))
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.state == SessionState::InProgress
            && self.deadline().map(|d| now >= d).unwrap_or(false)
    }

    pub fn unanswered(&self) -> Vec<String> {
        self.quiz
            .questions
            .iter()
            .filter(|q| !self.attempt.is_answered(&q.id))
            .map(|q| q.id.clone())
            .collect()
    }

    /// Claims the submission. Only one caller can hold a ticket at a time and
    /// a finished session never hands out another.
    pub fn begin_submission(&mut self, trigger: SubmitTrigger) -> Result<SubmitDecision, SessionError> {
        match self.state {
            SessionState::InProgress => {}
            SessionState::NotStarted => return Err(SessionError::NotStarted),
            SessionState::Submitting => return Err(SessionError::SubmissionInProgress),
            SessionState::Completed | SessionState::Terminated => {
                return Err(SessionError::AlreadySubmitted)
            }
        }

        let termination_reason = match &trigger {
            SubmitTrigger::Manual { confirm_unanswered } => {
                if !confirm_unanswered && self.pending.is_none() {
                    let unanswered = self.unanswered();
                    if !unanswered.is_empty() {
                        return Ok(SubmitDecision::NeedsConfirmation { unanswered });
                    }
                }
                None
            }
            SubmitTrigger::TimeExpired => None,
            SubmitTrigger::Violation { reason } => Some(reason.clone()),
        };

        // A result graded before a failed write still has to reflect how the
        // attempt ended.
        let graded = self.pending.clone().map(|mut graded| {
            if let Some(reason) = &termination_reason {
                graded.status = CompletionStatus::Terminated;
                graded.termination_reason = Some(reason.clone());
            }
            graded.violation_count = self.attempt.violations;
            graded
        });

        self.state = SessionState::Submitting;
        self.monitor.dismiss_warning();
        Ok(SubmitDecision::Proceed(SubmissionTicket {
            session_id: self.id,
            candidate_id: self.candidate_id.clone(),
            quiz: Arc::clone(&self.quiz),
            answers: self.attempt.answers.clone(),
            termination_reason,
            violation_count: self.attempt.violations,
            started_at: self.attempt.started_at,
            graded,
        }))
    }

    pub fn complete_submission(&mut self, result: QuizResult) {
        self.state = match result.status {
            CompletionStatus::Completed => SessionState::Completed,
            CompletionStatus::Terminated => SessionState::Terminated,
        };
        self.attempt.completed_at = Some(result.completed_at);
        self.pending = None;
        self.result = Some(result);
    }

    /// Releases the submission after a failed write. A graded result is kept
    /// so the retry saves exactly what was graded.
    pub fn fail_submission(&mut self, graded: Option<QuizResult>) {
        if self.state == SessionState::Submitting {
            self.state = SessionState::InProgress;
        }
        if graded.is_some() {
            self.pending = graded;
        }
    }

    pub fn checkpoint(&self, now: DateTime<Utc>) -> SessionCheckpoint {
        SessionCheckpoint {
            session_id: self.id,
            quiz_id: self.quiz.quiz.id.clone(),
            candidate_id: self.candidate_id.clone(),
            attempt: self.attempt.clone(),
            saved_at: now,
        }
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            session_id: self.id,
            quiz_id: self.quiz.quiz.id.clone(),
            candidate_id: self.candidate_id.clone(),
            state: self.state,
            current_index: self.attempt.current_index,
            question_count: self.quiz.question_count(),
            questions: self
                .quiz
                .questions
                .iter()
                .map(|q| QuestionProgress {
                    question_id: q.id.clone(),
                    answered: self.attempt.is_answered(&q.id),
                    flagged: self.attempt.flags.contains(&q.id),
                })
                .collect(),
            violation_count: self.monitor.violations(),
            max_violations: self.policy.max_violations,
            fullscreen_overlay: self.monitor.overlay_visible(),
            warning: self.monitor.warning().cloned(),
            is_submitting: self.state == SessionState::Submitting,
            result_pending_retry: self.pending.is_some(),
            checkpoint_saved: self.checkpoint_saved,
            started_at: self.attempt.started_at,
            deadline: self.deadline(),
            total_marks: self.quiz.total_marks(),
        }
    }
}
