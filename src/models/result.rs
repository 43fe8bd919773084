use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::models::execution::{ExecutionStatus, TestCaseResult};

pub const RESULTS_COLLECTION: &str = "quiz_results";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStatus {
    Correct,
    Partial,
    Incorrect,
    Unanswered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: String,
    pub score: Decimal,
    pub max_score: Decimal,
    pub status: QuestionStatus,
    pub user_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_status: Option<ExecutionStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_results: Option<Vec<TestCaseResult>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    Completed,
    Terminated,
}

/// Terminal record of an attempt; written once and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: Uuid,
    pub session_id: Uuid,
    pub quiz_id: String,
    pub candidate_id: String,
    pub score: Decimal,
    pub total_possible: Decimal,
    pub question_results: BTreeMap<String, QuestionResult>,
    pub status: CompletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination_reason: Option<String>,
    pub violation_count: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
}

impl QuizResult {
    /// Copy safe to hand back to the candidate: hidden test cases removed.
    pub fn candidate_view(&self) -> QuizResult {
        let mut view = self.clone();
        for result in view.question_results.values_mut() {
            if let Some(cases) = result.test_results.as_mut() {
                cases.retain(|tc| !tc.is_hidden);
            }
        }
        view
    }
}
