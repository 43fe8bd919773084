use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Mutable state of one candidate's pass through a quiz.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub current_index: usize,
    /// Raw answers: option index as a string for MCQ, source text for coding.
    pub answers: BTreeMap<String, String>,
    pub flags: BTreeSet<String>,
    pub violations: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Attempt {
    pub fn is_answered(&self, question_id: &str) -> bool {
        self.answers
            .get(question_id)
            .map(|a| !a.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Snapshot written to the checkpoint store so a reload can restore progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionCheckpoint {
    pub session_id: Uuid,
    pub quiz_id: String,
    pub candidate_id: String,
    pub attempt: Attempt,
    pub saved_at: DateTime<Utc>,
}
