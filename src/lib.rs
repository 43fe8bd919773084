pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use crate::config::Config;
use crate::services::{
    checkpoint_service::{CheckpointStore, MemoryCheckpointStore, PgCheckpointStore},
    execution_client::{ExecutionClient, Judge0Client},
    grading_service::GradingService,
    proctoring::ProctoringPolicy,
    question_cache::QuestionCache,
    quiz_service::QuizService,
    session_service::SessionService,
    store_service::{DocumentStore, MemoryDocumentStore, PgDocumentStore},
};
use reqwest::Client;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionService,
    pub quizzes: QuizService,
}

impl AppState {
    /// Wires the services from configuration. Without a pool everything is
    /// kept in process memory.
    pub fn new(config: &Config, pool: Option<PgPool>) -> error::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_millis(config.execution_timeout_ms.saturating_mul(2)))
            .build()?;
        let executor = Arc::new(Judge0Client::new(
            http_client,
            config.execution_api_url.clone(),
            config.execution_api_key.clone(),
            config.execution_api_host.clone(),
            Duration::from_millis(config.execution_timeout_ms),
        ));

        let (store, checkpoints): (Arc<dyn DocumentStore>, Arc<dyn CheckpointStore>) = match pool {
            Some(pool) => (
                Arc::new(PgDocumentStore::new(pool.clone(), config.store_batch_limit)),
                Arc::new(PgCheckpointStore::new(pool)),
            ),
            None => (
                Arc::new(MemoryDocumentStore::new(config.store_batch_limit)),
                Arc::new(MemoryCheckpointStore::new()),
            ),
        };

        Ok(Self::from_parts(
            store,
            checkpoints,
            executor,
            policy_from_config(config),
            Duration::from_secs(config.question_cache_ttl_secs),
        ))
    }

    pub fn from_parts(
        store: Arc<dyn DocumentStore>,
        checkpoints: Arc<dyn CheckpointStore>,
        executor: Arc<dyn ExecutionClient>,
        policy: ProctoringPolicy,
        question_cache_ttl: Duration,
    ) -> Self {
        let quizzes = QuizService::new(Arc::clone(&store), QuestionCache::new(question_cache_ttl));
        let sessions = SessionService::new(
            quizzes.clone(),
            GradingService::new(executor),
            store,
            checkpoints,
            policy,
        );
        Self { sessions, quizzes }
    }
}

pub fn policy_from_config(config: &Config) -> ProctoringPolicy {
    ProctoringPolicy {
        max_violations: config.max_violations,
        grace_period: chrono::Duration::milliseconds(config.violation_grace_ms as i64),
        coalesce_window: chrono::Duration::milliseconds(config.violation_coalesce_ms as i64),
    }
}
