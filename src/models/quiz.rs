use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use validator::Validate;

use crate::error::{Error, Result};
use crate::models::question::Question;

pub const QUIZZES_COLLECTION: &str = "quizzes";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Quiz {
    #[validate(length(min = 1))]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[validate(length(min = 1))]
    pub question_ids: Vec<String>,
    /// Minutes; 0 means unlimited.
    #[serde(default)]
    pub duration_minutes: u32,
}

impl Quiz {
    pub fn from_document(id: &str, mut doc: JsonValue) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidDocument {
            collection: QUIZZES_COLLECTION.to_string(),
            id: id.to_string(),
            reason,
        };
        if let Some(obj) = doc.as_object_mut() {
            obj.entry("id")
                .or_insert_with(|| JsonValue::String(id.to_string()));
        }
        let quiz: Quiz = serde_json::from_value(doc).map_err(|e| invalid(e.to_string()))?;
        if quiz.id != id {
            return Err(invalid(format!("embedded id '{}' does not match", quiz.id)));
        }
        quiz.validate().map_err(|e| invalid(e.to_string()))?;

        let mut seen = HashSet::new();
        if let Some(dup) = quiz.question_ids.iter().find(|qid| !seen.insert(qid.as_str())) {
            return Err(invalid(format!("question '{}' listed twice", dup)));
        }
        Ok(quiz)
    }
}

/// A quiz together with its questions, in quiz order.
#[derive(Debug, Clone)]
pub struct LoadedQuiz {
    pub quiz: Quiz,
    pub questions: Vec<Question>,
}

impl LoadedQuiz {
    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn total_marks(&self) -> Decimal {
        self.questions.iter().map(Question::effective_mark).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_duplicate_and_empty_question_lists() {
        let dup = json!({"question_ids": ["a", "a"], "duration_minutes": 5});
        assert!(Quiz::from_document("quiz", dup).is_err());

        let empty = json!({"question_ids": []});
        assert!(Quiz::from_document("quiz", empty).is_err());

        let ok = json!({"title": "Basics", "question_ids": ["a", "b"]});
        let quiz = Quiz::from_document("quiz", ok).unwrap();
        assert_eq!(quiz.duration_minutes, 0);
    }
}
