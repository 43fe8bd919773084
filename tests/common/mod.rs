#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assessment_backend::error::{Error, Result};
use assessment_backend::models::question::QUESTIONS_COLLECTION;
use assessment_backend::models::quiz::QUIZZES_COLLECTION;
use assessment_backend::services::checkpoint_service::MemoryCheckpointStore;
use assessment_backend::services::execution_client::{
    ExecutionClient, ExecutionFailure, RunOutcome, RunRequest,
};
use assessment_backend::services::proctoring::ProctoringPolicy;
use assessment_backend::services::store_service::{DocumentStore, MemoryDocumentStore};
use assessment_backend::AppState;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as JsonValue};
use tower::ServiceExt;

/// Tiny stand-in for the execution service. `echo` prints its stdin,
/// `broken` fails to compile, anything else prints nothing.
pub struct FakeJudge {
    pub calls: AtomicUsize,
    pub delay: Duration,
}

impl FakeJudge {
    pub fn new() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionClient for FakeJudge {
    async fn run(&self, request: RunRequest) -> std::result::Result<RunOutcome, ExecutionFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if request.source_code.contains("broken") {
            return Ok(RunOutcome {
                status_id: 6,
                status_description: "Compilation Error".into(),
                compile_output: Some("SyntaxError: invalid syntax".into()),
                ..Default::default()
            });
        }
        let stdout = if request.source_code.contains("echo") {
            request.stdin.clone().unwrap_or_default()
        } else {
            String::new()
        };
        let accepted = match &request.expected_output {
            Some(expected) => expected.trim() == stdout.trim(),
            None => true,
        };
        Ok(RunOutcome {
            status_id: if accepted { 3 } else { 4 },
            status_description: if accepted { "Accepted" } else { "Wrong Answer" }.into(),
            stdout: Some(stdout),
            time: Some(0.02),
            memory: Some(1024),
            ..Default::default()
        })
    }
}

/// Memory store whose inserts can be switched off.
pub struct FlakyStore {
    pub inner: MemoryDocumentStore,
    pub fail_creates: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: MemoryDocumentStore) -> Self {
        Self {
            inner,
            fail_creates: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_creates.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<JsonValue>> {
        self.inner.get(collection, id).await
    }

    async fn get_batch(&self, collection: &str, ids: &[String]) -> Result<Vec<(String, JsonValue)>> {
        self.inner.get_batch(collection, ids).await
    }

    async fn create(&self, collection: &str, id: &str, doc: &JsonValue) -> Result<()> {
        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(Error::Internal("connection reset".into()));
        }
        self.inner.create(collection, id, doc).await
    }

    fn batch_limit(&self) -> usize {
        self.inner.batch_limit()
    }
}

/// Quiz "basics": q1 is multiple choice (answer "1", mark 1), q2 is an echo
/// program (mark 4) with one visible and one hidden case.
pub fn seeded_store() -> MemoryDocumentStore {
    let store = MemoryDocumentStore::new(1);
    store.put(
        QUIZZES_COLLECTION,
        "basics",
        json!({"title": "Basics", "question_ids": ["q1", "q2"], "duration_minutes": 30}),
    );
    store.put(
        QUESTIONS_COLLECTION,
        "q1",
        json!({
            "type": "multiple_choice",
            "title": "2 + 2",
            "options": ["3", "4", "5"],
            "correct_option_index": 1
        }),
    );
    store.put(
        QUESTIONS_COLLECTION,
        "q2",
        json!({
            "type": "coding",
            "title": "Echo",
            "language": "python",
            "mark": 4,
            "starter_code": "print(input())",
            "test_cases": [
                {"input": "hello", "expected_output": "hello"},
                {"input": "secret", "expected_output": "secret", "is_hidden": true}
            ]
        }),
    );
    store
}

pub fn policy() -> ProctoringPolicy {
    ProctoringPolicy {
        grace_period: chrono::Duration::zero(),
        ..ProctoringPolicy::default()
    }
}

pub fn app_state(
    store: Arc<dyn DocumentStore>,
    checkpoints: Arc<MemoryCheckpointStore>,
    judge: Arc<FakeJudge>,
) -> AppState {
    AppState::from_parts(store, checkpoints, judge, policy(), Duration::from_secs(60))
}

pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    let body = if bytes.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

pub fn decimal(value: &JsonValue) -> rust_decimal::Decimal {
    match value {
        JsonValue::String(s) => s.parse().unwrap(),
        other => other.to_string().parse().unwrap(),
    }
}
