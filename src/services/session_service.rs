use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::dto::session_dto::{SessionQuestionsResponse, SessionView, SubmitResponse};
use crate::error::{Error, Result};
use crate::models::execution::ExecutionResult;
use crate::models::question::{CandidateQuestion, QuestionKind, TestCase};
use crate::models::result::{QuizResult, RESULTS_COLLECTION};
use crate::services::checkpoint_service::CheckpointStore;
use crate::services::grading_service::GradingService;
use crate::services::proctoring::{ProctoringOutcome, ProctoringPolicy, ProctoringSignal};
use crate::services::quiz_service::QuizService;
use crate::services::session::{
    ProctoredSession, SessionError, SessionState, SubmissionTicket, SubmitDecision, SubmitTrigger,
};
use crate::services::store_service::DocumentStore;
use crate::utils::time::now;

type SessionCell = Arc<Mutex<ProctoredSession>>;

fn lock(cell: &SessionCell) -> MutexGuard<'_, ProctoredSession> {
    cell.lock().expect("session mutex poisoned")
}

/// Owns the live sessions and drives them against the store, the checkpoint
/// store and the grading engine.
#[derive(Clone)]
pub struct SessionService {
    sessions: Arc<Mutex<HashMap<Uuid, SessionCell>>>,
    quizzes: QuizService,
    grading: GradingService,
    store: Arc<dyn DocumentStore>,
    checkpoints: Arc<dyn CheckpointStore>,
    policy: ProctoringPolicy,
}

impl SessionService {
    pub fn new(
        quizzes: QuizService,
        grading: GradingService,
        store: Arc<dyn DocumentStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        policy: ProctoringPolicy,
    ) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            quizzes,
            grading,
            store,
            checkpoints,
            policy,
        }
    }

    fn cell(&self, session_id: Uuid) -> Result<SessionCell> {
        let cell = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned")
            .get(&session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("Session {} not found", session_id)))?;
        lock(&cell).touch(now());
        Ok(cell)
    }

    fn cells(&self) -> Vec<SessionCell> {
        self.sessions
            .lock()
            .expect("session registry mutex poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Snapshots progress. A failure is reported through the view's
    /// `checkpoint_saved` flag rather than failing the request.
    async fn save_checkpoint(&self, cell: &SessionCell) -> bool {
        let checkpoint = lock(cell).checkpoint(now());
        let saved = match self.checkpoints.save(&checkpoint).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(session_id = %checkpoint.session_id, error = %e, "failed to save checkpoint");
                false
            }
        };
        lock(cell).set_checkpoint_saved(saved);
        saved
    }

    pub async fn create_session(&self, quiz_id: &str, candidate_id: &str) -> Result<SessionView> {
        let quiz = Arc::new(self.quizzes.load(quiz_id).await?);
        let session_id = Uuid::new_v4();
        let session = ProctoredSession::new(session_id, candidate_id.to_string(), quiz, self.policy);
        let cell = Arc::new(Mutex::new(session));

        self.sessions
            .lock()
            .expect("session registry mutex poisoned")
            .insert(session_id, Arc::clone(&cell));
        self.save_checkpoint(&cell).await;

        tracing::info!(%session_id, quiz_id, candidate_id, "session created");
        let view = lock(&cell).view();
        Ok(view)
    }

    /// Brings a session back from its checkpoint, e.g. after a restart.
    pub async fn resume(&self, session_id: Uuid) -> Result<SessionView> {
        if let Ok(cell) = self.cell(session_id) {
            return Ok(lock(&cell).view());
        }

        let checkpoint = self
            .checkpoints
            .load(session_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("No saved progress for session {}", session_id)))?;
        let quiz = Arc::new(self.quizzes.load(&checkpoint.quiz_id).await?);
        let restored = ProctoredSession::restore(checkpoint, quiz, self.policy);

        let cell = {
            let mut sessions = self.sessions.lock().expect("session registry mutex poisoned");
            Arc::clone(
                sessions
                    .entry(session_id)
                    .or_insert_with(|| Arc::new(Mutex::new(restored))),
            )
        };
        let view = lock(&cell).view();
        tracing::info!(%session_id, answers = view.questions.iter().filter(|q| q.answered).count(), "session resumed");
        Ok(view)
    }

    pub async fn view(&self, session_id: Uuid) -> Result<SessionView> {
        let cell = self.cell(session_id)?;
        self.enforce_deadline(&cell).await;
        let view = lock(&cell).view();
        Ok(view)
    }

    pub async fn questions(&self, session_id: Uuid) -> Result<SessionQuestionsResponse> {
        let cell = self.cell(session_id)?;
        self.enforce_deadline(&cell).await;
        let session = lock(&cell);
        let quiz = session.quiz();
        Ok(SessionQuestionsResponse {
            session_id,
            title: quiz.quiz.title.clone(),
            duration_minutes: quiz.quiz.duration_minutes,
            questions: quiz.questions.iter().map(CandidateQuestion::from).collect(),
        })
    }

    pub async fn result(&self, session_id: Uuid) -> Result<QuizResult> {
        let cell = self.cell(session_id)?;
        let session = lock(&cell);
        session
            .result()
            .map(QuizResult::candidate_view)
            .ok_or_else(|| Error::NotFound(format!("Session {} has no result yet", session_id)))
    }

    pub async fn start(&self, session_id: Uuid, fullscreen_entered: bool) -> Result<SessionView> {
        let cell = self.cell(session_id)?;
        let started = lock(&cell).start(fullscreen_entered, now());
        if let Err(e) = started {
            tracing::info!(%session_id, error = %e, "session start refused");
            return Err(e.into());
        }
        self.save_checkpoint(&cell).await;
        tracing::info!(%session_id, "session started");
        let view = lock(&cell).view();
        Ok(view)
    }

    pub async fn record_answer(
        &self,
        session_id: Uuid,
        question_id: &str,
        answer: String,
    ) -> Result<SessionView> {
        let cell = self.cell(session_id)?;
        self.enforce_deadline(&cell).await;
        lock(&cell).record_answer(question_id, answer)?;
        self.save_checkpoint(&cell).await;
        let view = lock(&cell).view();
        Ok(view)
    }

    pub async fn go_to(&self, session_id: Uuid, index: usize) -> Result<SessionView> {
        let cell = self.cell(session_id)?;
        self.enforce_deadline(&cell).await;
        lock(&cell).go_to(index)?;
        self.save_checkpoint(&cell).await;
        let view = lock(&cell).view();
        Ok(view)
    }

    pub async fn toggle_flag(&self, session_id: Uuid, question_id: &str) -> Result<SessionView> {
        let cell = self.cell(session_id)?;
        self.enforce_deadline(&cell).await;
        lock(&cell).toggle_flag(question_id)?;
        self.save_checkpoint(&cell).await;
        let view = lock(&cell).view();
        Ok(view)
    }

    pub async fn dismiss_warning(&self, session_id: Uuid) -> Result<SessionView> {
        let cell = self.cell(session_id)?;
        let view = {
            let mut session = lock(&cell);
            session.dismiss_warning();
            session.view()
        };
        Ok(view)
    }

    /// Feeds a proctoring signal to the session. Reaching the violation limit
    /// submits the attempt with a termination reason.
    pub async fn report_signal(
        &self,
        session_id: Uuid,
        signal: ProctoringSignal,
    ) -> Result<(ProctoringOutcome, SessionView, Option<QuizResult>)> {
        let cell = self.cell(session_id)?;
        self.enforce_deadline(&cell).await;
        let outcome = lock(&cell).observe(signal, now());

        let mut result = None;
        match &outcome {
            ProctoringOutcome::Warned(warning) => {
                tracing::warn!(%session_id, ?signal, violation = warning.violation, remaining = warning.remaining, "proctoring violation");
                self.save_checkpoint(&cell).await;
            }
            ProctoringOutcome::Terminate { violations, reason } => {
                tracing::warn!(%session_id, ?signal, violations, "violation limit reached; forcing submission");
                self.save_checkpoint(&cell).await;
                let trigger = SubmitTrigger::Violation {
                    reason: reason.clone(),
                };
                match self.submit_with(&cell, trigger).await {
                    Ok(SubmitResponse::Submitted { result: r }) => result = Some(r),
                    Ok(SubmitResponse::ConfirmationRequired { .. }) => {}
                    Err(Error::Session(SessionError::SubmissionInProgress))
                    | Err(Error::Session(SessionError::AlreadySubmitted)) => {
                        tracing::info!(%session_id, "forced submission skipped; already submitting");
                    }
                    Err(e) => return Err(e),
                }
            }
            ProctoringOutcome::Ignored | ProctoringOutcome::OverlayCleared => {}
        }

        let view = lock(&cell).view();
        Ok((outcome, view, result))
    }

    /// Runs candidate code against the visible test cases only. Nothing about
    /// the session changes.
    pub async fn run_code(
        &self,
        session_id: Uuid,
        question_id: &str,
        source_code: &str,
    ) -> Result<ExecutionResult> {
        let cell = self.cell(session_id)?;
        self.enforce_deadline(&cell).await;
        let (language, visible): (String, Vec<TestCase>) = {
            let session = lock(&cell);
            if session.state() != SessionState::InProgress {
                return Err(match session.state() {
                    SessionState::NotStarted => SessionError::NotStarted,
                    SessionState::Submitting => SessionError::SubmissionInProgress,
                    _ => SessionError::AlreadySubmitted,
                }
                .into());
            }
            let question = session
                .quiz()
                .question(question_id)
                .ok_or_else(|| SessionError::UnknownQuestion(question_id.to_string()))?;
            match &question.kind {
                QuestionKind::Coding(code) => (
                    code.language.clone(),
                    code.test_cases.iter().filter(|tc| !tc.is_hidden).cloned().collect(),
                ),
                QuestionKind::MultipleChoice(_) => {
                    return Err(SessionError::NotCodingQuestion(question_id.to_string()).into())
                }
            }
        };

        let result = self.grading.execute(source_code, &language, &visible).await?;
        Ok(result.redact_hidden())
    }

    pub async fn submit(&self, session_id: Uuid, confirm_unanswered: bool) -> Result<SubmitResponse> {
        let cell = self.cell(session_id)?;
        let overdue = lock(&cell).is_overdue(now());
        let trigger = if overdue {
            SubmitTrigger::TimeExpired
        } else {
            SubmitTrigger::Manual { confirm_unanswered }
        };
        self.submit_with(&cell, trigger).await
    }

    async fn submit_with(&self, cell: &SessionCell, trigger: SubmitTrigger) -> Result<SubmitResponse> {
        let decision = lock(cell).begin_submission(trigger)?;
        let ticket = match decision {
            SubmitDecision::NeedsConfirmation { unanswered } => {
                return Ok(SubmitResponse::ConfirmationRequired { unanswered });
            }
            SubmitDecision::Proceed(ticket) => ticket,
        };
        let session_id = ticket.session_id;

        let result = match ticket.graded.clone() {
            Some(graded) => graded,
            None => match self.grade(&ticket).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(%session_id, error = %e, "grading failed");
                    lock(cell).fail_submission(None);
                    return Err(e);
                }
            },
        };

        let stored = match self.persist(&result).await {
            Ok(stored) => stored,
            Err(e) => {
                tracing::error!(%session_id, error = %e, "failed to store quiz result");
                lock(cell).fail_submission(Some(result));
                return Err(Error::StoreUnavailable(e.to_string()));
            }
        };

        lock(cell).complete_submission(stored.clone());
        if let Err(e) = self.checkpoints.clear(session_id).await {
            tracing::warn!(%session_id, error = %e, "failed to clear checkpoint");
        }

        tracing::info!(
            %session_id,
            score = %stored.score,
            total = %stored.total_possible,
            status = ?stored.status,
            terminated = stored.termination_reason.is_some(),
            "quiz submitted"
        );
        Ok(SubmitResponse::Submitted {
            result: stored.candidate_view(),
        })
    }

    async fn grade(&self, ticket: &SubmissionTicket) -> Result<QuizResult> {
        let mut question_results = Vec::with_capacity(ticket.quiz.question_count());
        for question in &ticket.quiz.questions {
            let answer = ticket.answers.get(&question.id).map(String::as_str);
            question_results.push(self.grading.grade_question(question, answer).await?);
        }
        Ok(ticket.assemble(question_results, now()))
    }

    /// Writes the result keyed by session id. If a result for this session is
    /// already stored, that one wins.
    async fn persist(&self, result: &QuizResult) -> Result<QuizResult> {
        let key = result.session_id.to_string();
        let doc = serde_json::to_value(result)?;
        match self.store.create(RESULTS_COLLECTION, &key, &doc).await {
            Ok(()) => Ok(result.clone()),
            Err(Error::Conflict(_)) => {
                let existing = self
                    .store
                    .get(RESULTS_COLLECTION, &key)
                    .await?
                    .ok_or_else(|| Error::Internal(format!("result {} vanished after conflict", key)))?;
                tracing::warn!(session_id = %key, "result already stored; keeping the stored copy");
                Ok(serde_json::from_value(existing)?)
            }
            Err(e) => Err(e),
        }
    }

    async fn enforce_deadline(&self, cell: &SessionCell) {
        let overdue = lock(cell).is_overdue(now());
        if !overdue {
            return;
        }
        let session_id = lock(cell).id();
        tracing::info!(%session_id, "time limit reached; submitting");
        if let Err(e) = self.submit_with(cell, SubmitTrigger::TimeExpired).await {
            tracing::warn!(%session_id, error = %e, "timed-out submission failed");
        }
    }

    /// Submits every in-progress session whose time is up. Returns how many
    /// were submitted.
    pub async fn expire_overdue(&self) -> usize {
        let mut submitted = 0;
        for cell in self.cells() {
            let overdue = lock(&cell).is_overdue(now());
            if !overdue {
                continue;
            }
            match self.submit_with(&cell, SubmitTrigger::TimeExpired).await {
                Ok(SubmitResponse::Submitted { .. }) => submitted += 1,
                Ok(SubmitResponse::ConfirmationRequired { .. }) => {}
                Err(e) => {
                    let session_id = lock(&cell).id();
                    tracing::warn!(%session_id, error = %e, "deadline sweep could not submit");
                }
            }
        }
        submitted
    }

    /// Forgets finished sessions that are older than `retain`.
    pub fn evict_finished(&self, retain: chrono::Duration) -> usize {
        let cutoff = now() - retain;
        let mut sessions = self.sessions.lock().expect("session registry mutex poisoned");
        let before = sessions.len();
        sessions.retain(|_, cell| {
            let session = lock(cell);
            !(session.state().is_finished()
                && session
                    .attempt()
                    .completed_at
                    .map(|at| at < cutoff)
                    .unwrap_or(false))
        });
        before - sessions.len()
    }

    /// Drops open sessions nobody has touched for `idle`. Each one is
    /// checkpointed first so `resume` can bring it back; a session whose
    /// snapshot cannot be written stays in memory.
    pub async fn evict_idle(&self, idle: chrono::Duration) -> usize {
        let cutoff = now() - idle;
        let candidates: Vec<(Uuid, SessionCell)> = self
            .sessions
            .lock()
            .expect("session registry mutex poisoned")
            .iter()
            .filter(|(_, cell)| lock(cell).is_idle_since(cutoff))
            .map(|(id, cell)| (*id, Arc::clone(cell)))
            .collect();

        let mut evicted = 0;
        for (session_id, cell) in candidates {
            if !self.save_checkpoint(&cell).await {
                continue;
            }
            let mut sessions = self.sessions.lock().expect("session registry mutex poisoned");
            if lock(&cell).is_idle_since(cutoff) {
                sessions.remove(&session_id);
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::info!(evicted, "evicted idle sessions");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QUESTIONS_COLLECTION;
    use crate::models::quiz::QUIZZES_COLLECTION;
    use crate::models::result::{CompletionStatus, QuestionStatus};
    use crate::services::checkpoint_service::MemoryCheckpointStore;
    use crate::services::execution_client::{MockExecutionClient, RunOutcome};
    use crate::services::question_cache::QuestionCache;
    use crate::models::attempt::SessionCheckpoint;
    use crate::services::store_service::MemoryDocumentStore;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct FlakyCheckpoints {
        inner: MemoryCheckpointStore,
        failing: AtomicBool,
    }

    #[async_trait]
    impl CheckpointStore for FlakyCheckpoints {
        async fn save(&self, checkpoint: &SessionCheckpoint) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::Internal("disk full".into()));
            }
            self.inner.save(checkpoint).await
        }

        async fn load(&self, session_id: Uuid) -> Result<Option<SessionCheckpoint>> {
            self.inner.load(session_id).await
        }

        async fn clear(&self, session_id: Uuid) -> Result<()> {
            self.inner.clear(session_id).await
        }
    }

    fn accepted() -> RunOutcome {
        RunOutcome {
            status_id: 3,
            status_description: "Accepted".into(),
            stdout: Some("ok".into()),
            time: Some(0.01),
            memory: Some(64),
            ..Default::default()
        }
    }

    fn setup(client: MockExecutionClient) -> (SessionService, Arc<MemoryDocumentStore>, Arc<MemoryCheckpointStore>) {
        let store = Arc::new(MemoryDocumentStore::new(10));
        store.put(
            QUIZZES_COLLECTION,
            "quiz",
            json!({"title": "Basics", "question_ids": ["q1", "q2"], "duration_minutes": 30}),
        );
        store.put(
            QUESTIONS_COLLECTION,
            "q1",
            json!({"type": "mcq", "title": "2+2", "options": ["3", "4"], "correct_option_index": 1}),
        );
        store.put(
            QUESTIONS_COLLECTION,
            "q2",
            json!({
                "type": "coding", "title": "echo", "language": "python", "mark": 4,
                "test_cases": [
                    {"input": "a", "expected_output": "a"},
                    {"input": "b", "expected_output": "b", "is_hidden": true}
                ]
            }),
        );
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let policy = ProctoringPolicy {
            grace_period: chrono::Duration::zero(),
            ..ProctoringPolicy::default()
        };
        let svc = SessionService::new(
            QuizService::new(store.clone(), QuestionCache::new(Duration::from_secs(60))),
            GradingService::new(Arc::new(client)),
            store.clone(),
            checkpoints.clone(),
            policy,
        );
        (svc, store, checkpoints)
    }

    #[tokio::test]
    async fn full_submission_scores_and_clears_checkpoint() {
        let mut client = MockExecutionClient::new();
        client.expect_run().returning(|_| Ok(accepted()));
        let (svc, store, checkpoints) = setup(client);

        let view = svc.create_session("quiz", "cand-1").await.unwrap();
        let id = view.session_id;
        svc.start(id, true).await.unwrap();
        svc.record_answer(id, "q1", "1".into()).await.unwrap();
        svc.record_answer(id, "q2", "print(input())".into()).await.unwrap();
        assert!(checkpoints.load(id).await.unwrap().is_some());

        let SubmitResponse::Submitted { result } = svc.submit(id, false).await.unwrap() else {
            panic!("expected a submitted result");
        };
        assert_eq!(result.score, Decimal::from(5));
        assert_eq!(result.total_possible, Decimal::from(5));
        assert_eq!(result.status, CompletionStatus::Completed);
        assert_eq!(result.question_results["q1"].status, QuestionStatus::Correct);
        // hidden case graded but not shown
        assert_eq!(result.question_results["q2"].test_results.as_ref().unwrap().len(), 1);

        assert_eq!(store.count(RESULTS_COLLECTION), 1);
        assert!(checkpoints.load(id).await.unwrap().is_none());
        assert!(matches!(
            svc.submit(id, true).await.unwrap_err(),
            Error::Session(SessionError::AlreadySubmitted)
        ));
    }

    #[tokio::test]
    async fn third_violation_forces_submission() {
        let mut client = MockExecutionClient::new();
        client.expect_run().never();
        let (svc, store, _) = setup(client);

        let id = svc.create_session("quiz", "cand-2").await.unwrap().session_id;
        svc.start(id, true).await.unwrap();

        let (first, view, _) = svc.report_signal(id, ProctoringSignal::FullscreenExited).await.unwrap();
        assert!(matches!(first, ProctoringOutcome::Warned(_)));
        assert!(view.fullscreen_overlay);
        let (_, view, _) = svc.report_signal(id, ProctoringSignal::FullscreenEntered).await.unwrap();
        assert!(!view.fullscreen_overlay);
        assert_eq!(view.violation_count, 1);

        svc.report_signal(id, ProctoringSignal::VisibilityHidden).await.unwrap();
        let (outcome, view, result) = svc
            .report_signal(id, ProctoringSignal::FullscreenExited)
            .await
            .unwrap();
        assert!(matches!(outcome, ProctoringOutcome::Terminate { .. }));
        assert_eq!(view.state, SessionState::Terminated);
        let result = result.expect("forced submission result");
        assert!(result.termination_reason.is_some());
        assert_eq!(result.status, CompletionStatus::Terminated);
        assert_eq!(result.score, Decimal::ZERO);
        assert_eq!(store.count(RESULTS_COLLECTION), 1);
    }

    #[tokio::test]
    async fn run_code_uses_visible_cases_only() {
        let mut client = MockExecutionClient::new();
        // compile check + one visible case
        client.expect_run().times(2).returning(|_| Ok(accepted()));
        let (svc, _, _) = setup(client);

        let id = svc.create_session("quiz", "cand-3").await.unwrap().session_id;
        assert!(matches!(
            svc.run_code(id, "q2", "x").await.unwrap_err(),
            Error::Session(SessionError::NotStarted)
        ));
        svc.start(id, true).await.unwrap();
        let result = svc.run_code(id, "q2", "x").await.unwrap();
        assert_eq!(result.total_tests, 1);
        assert!(matches!(
            svc.run_code(id, "q1", "x").await.unwrap_err(),
            Error::Session(SessionError::NotCodingQuestion(_))
        ));
    }

    #[tokio::test]
    async fn resume_rebuilds_from_checkpoint() {
        let mut client = MockExecutionClient::new();
        client.expect_run().never();
        let (svc, store, checkpoints) = setup(client);

        let id = svc.create_session("quiz", "cand-4").await.unwrap().session_id;
        svc.start(id, true).await.unwrap();
        svc.record_answer(id, "q1", "0".into()).await.unwrap();

        // a fresh service sharing the same stores stands in for a restart
        let restarted = SessionService::new(
            QuizService::new(store.clone(), QuestionCache::new(Duration::from_secs(60))),
            GradingService::new(Arc::new(MockExecutionClient::new())),
            store.clone(),
            checkpoints.clone(),
            ProctoringPolicy::default(),
        );
        assert!(matches!(restarted.view(id).await.unwrap_err(), Error::NotFound(_)));
        let view = restarted.resume(id).await.unwrap();
        assert_eq!(view.state, SessionState::NotStarted);
        assert!(view.questions[0].answered);
        assert!(matches!(
            restarted.resume(Uuid::new_v4()).await.unwrap_err(),
            Error::NotFound(_)
        ));
    }
    #[tokio::test]
    async fn overdue_sessions_submit_on_access_and_in_sweep() {
        let mut client = MockExecutionClient::new();
        client.expect_run().never();
        let (svc, store, checkpoints) = setup(client);

        let mut ids = Vec::new();
        for candidate in ["late-1", "late-2"] {
            let id = svc.create_session("quiz", candidate).await.unwrap().session_id;
            svc.start(id, true).await.unwrap();
            svc.record_answer(id, "q1", "1".into()).await.unwrap();
            let mut cp = checkpoints.load(id).await.unwrap().unwrap();
            cp.attempt.started_at = Some(now() - chrono::Duration::minutes(31));
            checkpoints.save(&cp).await.unwrap();
            ids.push(id);
        }

        let restarted = SessionService::new(
            QuizService::new(store.clone(), QuestionCache::new(Duration::from_secs(60))),
            GradingService::new(Arc::new(MockExecutionClient::new())),
            store.clone(),
            checkpoints.clone(),
            ProctoringPolicy::default(),
        );
        for id in &ids {
            restarted.resume(*id).await.unwrap();
            restarted.start(*id, true).await.unwrap();
        }

        let view = restarted.view(ids[0]).await.unwrap();
        assert_eq!(view.state, SessionState::Completed);
        let result = restarted.result(ids[0]).await.unwrap();
        assert!(result.termination_reason.is_none());
        assert_eq!(result.score, Decimal::ONE);

        assert_eq!(restarted.expire_overdue().await, 1);
        assert_eq!(restarted.expire_overdue().await, 0);
        assert_eq!(store.count(RESULTS_COLLECTION), 2);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted_and_resumable() {
        let mut client = MockExecutionClient::new();
        client.expect_run().never();
        let (svc, _, _) = setup(client);

        let idle = svc.create_session("quiz", "cand-idle").await.unwrap().session_id;
        svc.start(idle, true).await.unwrap();
        svc.record_answer(idle, "q1", "1".into()).await.unwrap();
        let never_started = svc.create_session("quiz", "cand-gone").await.unwrap().session_id;

        assert_eq!(svc.evict_idle(chrono::Duration::hours(1)).await, 0);
        assert_eq!(svc.evict_idle(chrono::Duration::zero()).await, 2);
        assert!(matches!(svc.view(idle).await.unwrap_err(), Error::NotFound(_)));
        assert!(matches!(svc.view(never_started).await.unwrap_err(), Error::NotFound(_)));

        let view = svc.resume(idle).await.unwrap();
        assert_eq!(view.state, SessionState::NotStarted);
        assert!(view.questions[0].answered);
        assert!(view.started_at.is_some());
    }

    #[tokio::test]
    async fn failed_checkpoints_are_visible_and_block_eviction() {
        let store = Arc::new(MemoryDocumentStore::new(10));
        store.put(
            QUIZZES_COLLECTION,
            "quiz",
            json!({"title": "Basics", "question_ids": ["q1"], "duration_minutes": 0}),
        );
        store.put(
            QUESTIONS_COLLECTION,
            "q1",
            json!({"type": "mcq", "title": "2+2", "options": ["3", "4"], "correct_option_index": 1}),
        );
        let checkpoints = Arc::new(FlakyCheckpoints::default());
        let svc = SessionService::new(
            QuizService::new(store.clone(), QuestionCache::new(Duration::from_secs(60))),
            GradingService::new(Arc::new(MockExecutionClient::new())),
            store.clone(),
            checkpoints.clone(),
            ProctoringPolicy::default(),
        );

        let id = svc.create_session("quiz", "cand-disk").await.unwrap().session_id;
        checkpoints.failing.store(true, Ordering::SeqCst);
        let view = svc.start(id, true).await.unwrap();
        assert!(!view.checkpoint_saved);
        let view = svc.record_answer(id, "q1", "1".into()).await.unwrap();
        assert!(!view.checkpoint_saved);
        assert_eq!(svc.evict_idle(chrono::Duration::zero()).await, 0);
        assert!(svc.view(id).await.is_ok());

        checkpoints.failing.store(false, Ordering::SeqCst);
        let view = svc.go_to(id, 0).await.unwrap();
        assert!(view.checkpoint_saved);
        let saved = checkpoints.load(id).await.unwrap().unwrap();
        assert_eq!(saved.attempt.answers["q1"], "1");
    }
}
